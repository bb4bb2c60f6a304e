//! # Little Duck - a teaching compiler and virtual machine
//!
//! Little Duck is a small imperative language with typed global and local
//! variables, `void` procedures with typed parameters, `if`/`else`, `while`
//! and `do ... while` loops, and `print`. This crate compiles it in a single
//! pass into quadruples over a segmented address space and executes them on a
//! virtual machine.
//!
//! ## Quick Start
//!
//! ```rust
//! use little_duck::{Value, VirtualMachine};
//! use little_duck::compiler::{CompileOptions, Compiler};
//!
//! # fn main() -> little_duck::Result<()> {
//! let code = r#"
//!     program demo;
//!     var i: int;
//!     main {
//!         i = 0;
//!         while (i < 3) do {
//!             print("i=" + i);
//!             i = i + 1;
//!         };
//!     }
//!     end
//! "#;
//!
//! let program = Compiler::new(CompileOptions::default()).compile(code)?;
//! let mut vm = VirtualMachine::new(&program);
//! let report = vm.run()?;
//!
//! assert_eq!(report.output, vec!["i=0", "i=1", "i=2"]);
//! assert_eq!(vm.global_value("i"), Some(Value::Int(3)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → Tokens → Parser → Reductions → Translator → Program → VirtualMachine
//! ```
//!
//! - [`Scanner`] - Tokenizes source text, collecting lexical errors
//! - [`Parser`] - Recursive descent parser that reports each completed rule
//!   to a [`ReductionSink`]
//! - [`compiler::Translator`] - Semantic checks and quadruple emission
//! - [`Program`] - Quadruples plus constant, function and memory tables
//! - [`VirtualMachine`] - Executes a [`Program`]
//!
//! ## Error Handling
//!
//! Lexical, syntax and semantic errors are accumulated and reported together;
//! a program with any of them is never run:
//!
//! ```rust
//! use little_duck::Error;
//!
//! let err = little_duck::run("program p; main { x = 1; y = 2; } end").unwrap_err();
//! match err {
//!     Error::CompilationFailed { diagnostics } => assert_eq!(diagnostics.len(), 2),
//!     other => panic!("unexpected: {}", other),
//! }
//! ```

/// Version of the Little Duck toolchain
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;

// Re-export main types
pub use compiler::{CompileOptions, Compiler, Program, Translation};
pub use error::{Error, ErrorPhase, Result, RuntimeFault};
pub use lexer::{Scanner, Token, TokenKind};
pub use parser::{Parser, Reduction, ReductionSink};
pub use runtime::{ExecutionReport, Value, VirtualMachine, VmOptions};

/// Compile `source` with default options and run it to completion
pub fn run(source: &str) -> Result<ExecutionReport> {
    let program = Compiler::new(CompileOptions::default()).compile(source)?;
    VirtualMachine::new(&program).run()
}
