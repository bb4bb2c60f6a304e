//! Reduction events: the interface between parsing and code generation
//!
//! Every completed grammar rule produces one [`Reduction`]. The order of the
//! stream is significant: backpatching in the translator relies on seeing
//! control-flow markers exactly where the rule completes.

use serde::{Deserialize, Serialize};

use crate::compiler::types::{BinaryOp, ValueType};
use crate::Result;

/// One completed grammar rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reduction {
    // Program structure
    /// `program NAME ;`
    ProgramStart {
        /// Program name
        name: String,
    },
    /// `a, b : type ;` inside a `var` section
    VarDecl {
        /// Declared names in source order
        names: Vec<String>,
        /// Declared type
        ty: ValueType,
    },
    /// `void NAME (`
    FunctionStart {
        /// Function name
        name: String,
    },
    /// One formal parameter `NAME : type`
    Param {
        /// Parameter name
        name: String,
        /// Parameter type
        ty: ValueType,
    },
    /// Closing `)` of the parameter list; the body starts at the next instruction
    FunctionSignature,
    /// Closing `]` of a function
    FunctionEnd,
    /// `main` keyword
    MainStart,
    /// Final `end`
    ProgramEnd,

    // Statements
    /// `NAME = expression ;` after the expression reduced
    Assign {
        /// Assignment target
        target: String,
    },
    /// Condition of an `if` reduced
    IfCondition,
    /// `else` keyword after the then-branch
    Else,
    /// End of the whole `if` statement
    IfEnd,
    /// `while` keyword, before the condition
    WhileStart,
    /// Condition of a `while` reduced
    WhileCondition,
    /// End of the `while` body
    WhileEnd,
    /// `do` keyword, before the body
    DoStart,
    /// Trailing condition of a `do ... while` reduced
    DoEnd,
    /// `NAME (` of a call statement
    CallStart {
        /// Callee
        name: String,
    },
    /// One call argument reduced
    CallArgument,
    /// Closing `)` of a call
    CallEnd,
    /// One `print` item reduced
    PrintItem,

    // Expressions
    /// Variable reference
    Identifier(String),
    /// Integer literal
    IntLiteral(i64),
    /// Float literal
    FloatLiteral(f64),
    /// String literal
    StringLiteral(String),
    /// Binary operator seen; pushed until its right operand reduces
    Operator(BinaryOp),
    /// Right operand of the innermost pending operator reduced
    Binary,
    /// Unary minus applied to the operand just reduced
    Negate,

    /// A statement was discarded after a syntax error
    Recover,
}

/// Consumer of reduction events
///
/// `reduce` returns an error only for faults that must abort translation;
/// user-level errors are accumulated by the implementor.
pub trait ReductionSink {
    /// Handle one event
    fn reduce(&mut self, event: Reduction) -> Result<()>;
}

/// Recording sink, used to inspect the event stream
impl ReductionSink for Vec<Reduction> {
    fn reduce(&mut self, event: Reduction) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
