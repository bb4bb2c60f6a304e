//! Error types for the Little Duck compiler and virtual machine

use thiserror::Error;

use crate::compiler::memory::Segment;
use crate::compiler::types::ValueType;
use crate::compiler::Address;

/// Compiler and runtime errors
///
/// Lexical, syntax and semantic errors are *accumulated* during translation and
/// reported together. Allocation overflow, internal defects and runtime faults are
/// fatal and abort the current phase immediately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Lexical errors
    /// Illegal character in the source text
    #[error("Lexical error at line {line}, column {col}: illegal character '{character}'")]
    LexicalError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// The offending character
        character: char,
    },

    /// String literal without a closing quote
    #[error("Lexical error at line {line}, column {col}: unterminated string literal")]
    UnterminatedString {
        /// Line number where the literal starts
        line: usize,
        /// Column number where the literal starts
        col: usize,
    },

    // Syntax errors
    /// Unexpected token encountered during parsing
    ///
    /// **Triggered by:** tokens the grammar does not allow at this point
    /// **Example:** `x = 3 +;` (missing right operand)
    #[error("Syntax error at line {line}, column {col}: expected {expected}, got '{got}'")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// What the grammar expected
        expected: String,
        /// Lexeme actually found
        got: String,
    },

    /// Unexpected end of input during parsing
    #[error("Syntax error: unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What the grammar expected
        expected: String,
    },

    // Semantic errors
    /// Name declared twice in the same scope
    #[error("Semantic error: variable '{name}' already declared in scope '{scope}'")]
    Redeclaration {
        /// Variable name
        name: String,
        /// Scope that already owns the name
        scope: String,
    },

    /// Reference to a variable never declared
    #[error("Semantic error: variable '{name}' is not declared")]
    UndeclaredVariable {
        /// Variable name
        name: String,
    },

    /// Call to a function never declared
    #[error("Semantic error: function '{name}' is not declared")]
    UndeclaredFunction {
        /// Function name
        name: String,
    },

    /// Function declared twice
    #[error("Semantic error: function '{name}' already declared")]
    DuplicateFunction {
        /// Function name
        name: String,
    },

    /// Operator applied to an incompatible pair of types
    ///
    /// **Triggered by:** pairs outside the semantic cube
    /// **Example:** `"ab" * 3.0`, `i = 2.5` with `i:int`
    #[error("Semantic error: operation '{op}' is not valid between '{left}' and '{right}'")]
    TypeMismatch {
        /// Operator symbol
        op: String,
        /// Left operand type (assignment target for `=`)
        left: ValueType,
        /// Right operand type
        right: ValueType,
    },

    /// Unary operator applied to an incompatible type
    #[error("Semantic error: unary '{op}' is not valid on '{operand}'")]
    UnaryMismatch {
        /// Operator symbol
        op: String,
        /// Operand type
        operand: ValueType,
    },

    /// Condition of `if`/`while`/`do-while` is not boolean
    #[error("Semantic error: {construct} condition must be bool, got '{got}'")]
    NonBooleanCondition {
        /// Construct name
        construct: String,
        /// Type actually found
        got: ValueType,
    },

    /// Wrong number of call arguments
    #[error("Semantic error: function '{function}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        /// Callee name
        function: String,
        /// Number of formal parameters
        expected: usize,
        /// Number of arguments passed
        got: usize,
    },

    /// Argument type not accepted by the formal parameter
    #[error("Semantic error: argument {position} of '{function}' must be '{expected}', got '{got}'")]
    ParameterType {
        /// Callee name
        function: String,
        /// 1-based argument position
        position: usize,
        /// Formal parameter type
        expected: ValueType,
        /// Argument type
        got: ValueType,
    },

    // Fatal compile-time errors
    /// A memory segment ran out of addresses
    #[error("Allocation overflow: segment {segment} exhausted")]
    AllocationOverflow {
        /// Exhausted segment
        segment: Segment,
    },

    /// Translator invariant violated (a compiler defect, not a user error)
    #[error("Internal compiler error: {0}")]
    Internal(String),

    /// Translation finished with accumulated errors
    #[error("Compilation failed with {} error(s)", diagnostics.len())]
    CompilationFailed {
        /// All accumulated lexical, syntax and semantic errors
        diagnostics: Vec<Error>,
    },

    /// Persisted intermediate form could not be read back
    #[error("Malformed artifact at line {line}: {message}")]
    MalformedArtifact {
        /// 1-based line in the artifact text
        line: usize,
        /// What was wrong
        message: String,
    },

    // Runtime errors
    /// Fatal virtual machine fault
    #[error("Runtime error at instruction {ip}: {fault}")]
    RuntimeError {
        /// Index of the offending instruction
        ip: usize,
        /// What went wrong
        fault: RuntimeFault,
    },
}

/// Faults raised while executing quadruples
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeFault {
    /// Division with a zero divisor
    #[error("division by zero")]
    DivisionByZero,

    /// Address outside every segment
    #[error("invalid address {0}")]
    InvalidAddress(Address),

    /// Constant address with no interned value
    #[error("no constant stored at {0}")]
    MissingConstant(Address),

    /// Attempt to write into the constant segment
    #[error("cannot write to constant address {0}")]
    ConstantWrite(Address),

    /// String result larger than the runtime allows
    #[error("string result exceeds the {limit}-byte limit")]
    StringTooLong {
        /// Maximum string length in bytes
        limit: usize,
    },

    /// Recursion ceiling reached
    #[error("stack overflow: call depth limit of {limit} exceeded")]
    StackOverflow {
        /// Configured ceiling
        limit: usize,
    },

    /// Operand values the instruction cannot combine
    #[error("operation '{op}' not supported between {left} and {right}")]
    InvalidOperands {
        /// Operator symbol
        op: String,
        /// Left value kind
        left: String,
        /// Right value kind
        right: String,
    },

    /// Instruction with a missing or unpatched field
    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),
}

/// Which phase an error belongs to and whether it aborts that phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Accumulated tokenizer error
    Lexical,
    /// Accumulated parser error
    Syntax,
    /// Accumulated semantic error
    Semantic,
    /// Aborts translation immediately
    Fatal,
    /// Aborts execution immediately
    Runtime,
}

impl Error {
    /// Create an internal compiler error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a runtime error at the given instruction
    pub fn runtime(ip: usize, fault: RuntimeFault) -> Self {
        Error::RuntimeError { ip, fault }
    }

    /// Classify the error by phase
    pub fn phase(&self) -> ErrorPhase {
        match self {
            Error::LexicalError { .. } | Error::UnterminatedString { .. } => ErrorPhase::Lexical,

            Error::SyntaxError { .. } | Error::UnexpectedEof { .. } => ErrorPhase::Syntax,

            Error::Redeclaration { .. }
            | Error::UndeclaredVariable { .. }
            | Error::UndeclaredFunction { .. }
            | Error::DuplicateFunction { .. }
            | Error::TypeMismatch { .. }
            | Error::UnaryMismatch { .. }
            | Error::NonBooleanCondition { .. }
            | Error::ArityMismatch { .. }
            | Error::ParameterType { .. } => ErrorPhase::Semantic,

            Error::AllocationOverflow { .. }
            | Error::Internal(_)
            | Error::CompilationFailed { .. }
            | Error::MalformedArtifact { .. } => ErrorPhase::Fatal,

            Error::RuntimeError { .. } => ErrorPhase::Runtime,
        }
    }

    /// True if the error aborts the phase that raised it
    pub fn is_fatal(&self) -> bool {
        matches!(self.phase(), ErrorPhase::Fatal | ErrorPhase::Runtime)
    }
}

/// Result type for Little Duck operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulated_errors_are_not_fatal() {
        let err = Error::Redeclaration {
            name: "x".to_string(),
            scope: "global".to_string(),
        };
        assert_eq!(err.phase(), ErrorPhase::Semantic);
        assert!(!err.is_fatal());

        let err = Error::LexicalError {
            line: 1,
            col: 4,
            character: '$',
        };
        assert_eq!(err.phase(), ErrorPhase::Lexical);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_overflow_and_runtime_are_fatal() {
        let err = Error::AllocationOverflow {
            segment: Segment::TempInt,
        };
        assert!(err.is_fatal());

        let err = Error::runtime(3, RuntimeFault::DivisionByZero);
        assert_eq!(err.phase(), ErrorPhase::Runtime);
        assert!(err.to_string().contains("instruction 3"));
        assert!(err.to_string().contains("division by zero"));
    }
}
