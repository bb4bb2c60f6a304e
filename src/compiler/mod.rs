//! # Little Duck Compiler - source to quadruples
//!
//! This module compiles Little Duck programs into a flat list of quadruples
//! over a segmented address space, ready for the [`crate::runtime`] virtual
//! machine.
//!
//! ## Architecture
//!
//! ```text
//! Source → Tokens → Reductions → Translator → Program (quadruples + tables)
//! ```
//!
//! The parser never builds a tree: each completed grammar rule is handed to
//! the [`Translator`] as a [`crate::parser::Reduction`], and code is emitted
//! in the same pass.
//!
//! ## Usage
//!
//! ```
//! use little_duck::compiler::{CompileOptions, Compiler};
//!
//! let source = "program p; var x: int; main { x = 2 + 3 * 4; } end";
//! let compiler = Compiler::new(CompileOptions::default());
//! let program = compiler.compile(source)?;
//! assert_eq!(program.len(), 4);
//! # Ok::<(), little_duck::Error>(())
//! ```

pub mod constants;
pub mod ir;
pub mod memory;
pub mod symbols;
pub mod translator;
pub mod types;

pub use constants::{Constant, ConstantPool, Literal};
pub use ir::{Opcode, Operand, Program, Quadruple};
pub use memory::{Address, Allocator, MemoryUsage, Segment, SegmentClass, SEGMENT_SIZE};
pub use symbols::{Function, FunctionDirectory, Param, ReturnKind, Scope, SymbolTable, Variable};
pub use translator::Translator;
pub use types::{BinaryOp, CubeResult, ValueType};

use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::{Error, Result};

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Addresses available in every memory segment (at most [`SEGMENT_SIZE`])
    pub segment_capacity: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            segment_capacity: SEGMENT_SIZE,
        }
    }
}

/// Best-effort translation result
#[derive(Debug, Clone)]
pub struct Translation {
    /// Emitted program; only runnable when `diagnostics` is empty
    pub program: Program,
    /// Accumulated lexical, syntax and semantic errors in that order
    pub diagnostics: Vec<Error>,
}

impl Translation {
    /// True if no error was recorded
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Little Duck to quadruple compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Translate source text, keeping whatever was emitted despite errors.
    ///
    /// Only fatal errors (allocation overflow, internal defects) are returned
    /// as `Err`; everything else is reported in [`Translation::diagnostics`].
    pub fn translate(&self, source: &str) -> Result<Translation> {
        // Phase 1: Scan
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens();
        let mut upstream = scanner.take_errors();

        // Phase 2: Parse and translate in one pass
        let mut translator =
            Translator::with_allocator(Allocator::with_capacity(self.options.segment_capacity));
        let mut parser = Parser::new(tokens, &mut translator);
        parser.parse()?;
        upstream.extend(parser.take_errors());

        translator.finish(upstream)
    }

    /// Compile source text into a runnable program.
    ///
    /// Fails with [`Error::CompilationFailed`] if any error was recorded; a
    /// program with errors is never returned.
    pub fn compile(&self, source: &str) -> Result<Program> {
        let translation = self.translate(source)?;
        if !translation.is_clean() {
            return Err(Error::CompilationFailed {
                diagnostics: translation.diagnostics,
            });
        }
        Ok(translation.program)
    }
}
