//! # Type system for Little Duck compilation
//!
//! Static types and the semantic cube: the fixed `(operator, left, right)`
//! compatibility table the translator consults before emitting a quadruple.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Static type of a value, variable or temporary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Text
    String,
    /// Result of a relational operator (temporaries only)
    Bool,
    /// Function return kind
    Void,
    /// Poisoned result of a failed check; never reported twice
    Error,
}

impl ValueType {
    /// Keyword spelling used in source and in the persisted artifact
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Void => "void",
            ValueType::Error => "error",
        }
    }

    /// True for `int` and `float`
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "int" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "string" => Ok(ValueType::String),
            "bool" => Ok(ValueType::Bool),
            "void" => Ok(ValueType::Void),
            "error" => Ok(ValueType::Error),
            other => Err(format!("unknown type '{}'", other)),
        }
    }
}

/// Binary operators understood by the semantic cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `=` (left is the assignment target)
    Assign,
}

impl BinaryOp {
    /// Source spelling
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Assign => "=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Outcome of a semantic cube lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeResult {
    /// The pair is legal and produces this type
    Valid(ValueType),
    /// One operand was already poisoned; propagate silently
    Poisoned,
    /// The pair is outside the cube
    Incompatible,
}

/// Look up the result type of `left op right`.
///
/// The table is asymmetric: `string + int` is legal but `int + string` is not,
/// and `string * int` repeats text while `string * float` is rejected.
pub fn check_binary(op: BinaryOp, left: ValueType, right: ValueType) -> CubeResult {
    use ValueType::*;

    if left == Error || right == Error {
        return CubeResult::Poisoned;
    }

    let result = match op {
        BinaryOp::Add => match (left, right) {
            (Int, Int) => Some(Int),
            (Int, Float) | (Float, Int) | (Float, Float) => Some(Float),
            (String, String) | (String, Int) | (String, Float) => Some(String),
            _ => None,
        },
        BinaryOp::Sub => numeric(left, right),
        BinaryOp::Mul => match (left, right) {
            (String, Int) => Some(String),
            _ => numeric(left, right),
        },
        BinaryOp::Div => match (left, right) {
            (l, r) if l.is_numeric() && r.is_numeric() => Some(Float),
            _ => None,
        },
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne => {
            match (left, right) {
                (l, r) if l.is_numeric() && r.is_numeric() => Some(Bool),
                (String, String) => Some(Bool),
                _ => None,
            }
        }
        BinaryOp::Assign => match (left, right) {
            (Int, Int) => Some(Int),
            (Float, Int) | (Float, Float) => Some(Float),
            (String, String) => Some(String),
            _ => None,
        },
    };

    match result {
        Some(ty) => CubeResult::Valid(ty),
        None => CubeResult::Incompatible,
    }
}

/// Look up the result type of unary minus
pub fn check_negate(operand: ValueType) -> CubeResult {
    match operand {
        ValueType::Error => CubeResult::Poisoned,
        ValueType::Int | ValueType::Float => CubeResult::Valid(operand),
        _ => CubeResult::Incompatible,
    }
}

/// True if an argument of type `arg` may bind to a parameter of type `param`.
/// Exact match, or int widened to float.
pub fn accepts_argument(param: ValueType, arg: ValueType) -> bool {
    param == arg || (param == ValueType::Float && arg == ValueType::Int)
}

fn numeric(left: ValueType, right: ValueType) -> Option<ValueType> {
    match (left, right) {
        (ValueType::Int, ValueType::Int) => Some(ValueType::Int),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(ValueType::Float),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ValueType::*;

    fn valid(op: BinaryOp, l: ValueType, r: ValueType) -> Option<ValueType> {
        match check_binary(op, l, r) {
            CubeResult::Valid(ty) => Some(ty),
            _ => None,
        }
    }

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(valid(BinaryOp::Add, Int, Int), Some(Int));
        assert_eq!(valid(BinaryOp::Add, Int, Float), Some(Float));
        assert_eq!(valid(BinaryOp::Sub, Float, Int), Some(Float));
        assert_eq!(valid(BinaryOp::Mul, Int, Int), Some(Int));
        assert_eq!(valid(BinaryOp::Div, Int, Int), Some(Float));
    }

    #[test]
    fn test_string_rules_are_asymmetric() {
        assert_eq!(valid(BinaryOp::Add, String, Int), Some(String));
        assert_eq!(valid(BinaryOp::Add, String, Float), Some(String));
        assert_eq!(valid(BinaryOp::Add, Int, String), None);
        assert_eq!(valid(BinaryOp::Mul, String, Int), Some(String));
        assert_eq!(valid(BinaryOp::Mul, String, Float), None);
        assert_eq!(valid(BinaryOp::Mul, Int, String), None);
        assert_eq!(valid(BinaryOp::Sub, String, String), None);
        assert_eq!(valid(BinaryOp::Div, String, Int), None);
    }

    #[test]
    fn test_relational_yields_bool() {
        for op in [
            BinaryOp::Gt,
            BinaryOp::Lt,
            BinaryOp::Ge,
            BinaryOp::Le,
            BinaryOp::Eq,
            BinaryOp::Ne,
        ] {
            assert_eq!(valid(op, Int, Float), Some(Bool));
            assert_eq!(valid(op, String, String), Some(Bool));
            assert_eq!(valid(op, String, Int), None);
            assert_eq!(valid(op, Bool, Bool), None);
        }
    }

    #[test]
    fn test_assignment_rejects_narrowing() {
        assert_eq!(valid(BinaryOp::Assign, Int, Int), Some(Int));
        assert_eq!(valid(BinaryOp::Assign, Float, Int), Some(Float));
        assert_eq!(valid(BinaryOp::Assign, String, String), Some(String));
        assert_eq!(
            check_binary(BinaryOp::Assign, Int, Float),
            CubeResult::Incompatible
        );
        assert_eq!(
            check_binary(BinaryOp::Assign, Int, Bool),
            CubeResult::Incompatible
        );
    }

    #[test]
    fn test_poison_propagates_silently() {
        assert_eq!(check_binary(BinaryOp::Add, Error, Int), CubeResult::Poisoned);
        assert_eq!(check_binary(BinaryOp::Lt, Int, Error), CubeResult::Poisoned);
        assert_eq!(check_negate(Error), CubeResult::Poisoned);
        assert_eq!(check_negate(String), CubeResult::Incompatible);
    }

    #[test]
    fn test_argument_widening() {
        assert!(accepts_argument(Float, Int));
        assert!(!accepts_argument(Int, Float));
        assert!(accepts_argument(String, String));
    }
}
