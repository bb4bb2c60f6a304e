//! # Intermediate representation for Little Duck
//!
//! The translator emits a flat list of quadruples `(op, arg1, arg2, result)`.
//! Control flow is expressed with absolute instruction indices, filled in by
//! backpatching once a construct's exit point is known.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── instruction.rs  # Opcode, Operand, Quadruple
//! ├── program.rs      # Program (quadruples + constants + functions)
//! └── artifact.rs     # Persisted text form
//! ```

mod artifact;
mod instruction;
mod program;

pub use instruction::{Opcode, Operand, Quadruple};
pub use program::Program;
