use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compiler::{Literal, ValueType};
use crate::error::RuntimeFault;

/// Longest string a concatenation or repetition may produce, in bytes
pub const MAX_STRING_LEN: usize = 1 << 24;

/// Runtime value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit integer value
    Int(i64),
    /// 64-bit floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value (result of a relational operator)
    Bool(bool),
}

impl Value {
    /// Value of a storage location that was never written
    pub fn default_for(ty: ValueType) -> Option<Value> {
        match ty {
            ValueType::Int => Some(Value::Int(0)),
            ValueType::Float => Some(Value::Float(0.0)),
            ValueType::String => Some(Value::String(String::new())),
            ValueType::Bool => Some(Value::Bool(false)),
            ValueType::Void | ValueType::Error => None,
        }
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
        }
    }

    /// Converts value to a 64-bit floating-point number, if numeric
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Widen an integer to float; other values are returned unchanged
    pub fn widen_to_float(self) -> Value {
        match self {
            Value::Int(n) => Value::Float(n as f64),
            other => other,
        }
    }

    /// Addition, or concatenation when either side is text
    pub fn add(&self, rhs: &Value) -> Result<Value, RuntimeFault> {
        match (self, rhs) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                let text = format!("{}{}", self, rhs);
                if text.len() > MAX_STRING_LEN {
                    return Err(RuntimeFault::StringTooLong {
                        limit: MAX_STRING_LEN,
                    });
                }
                Ok(Value::String(text))
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            _ => self.float_op(rhs, "+", |a, b| a + b),
        }
    }

    /// Subtraction
    pub fn sub(&self, rhs: &Value) -> Result<Value, RuntimeFault> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            _ => self.float_op(rhs, "-", |a, b| a - b),
        }
    }

    /// Multiplication, or repetition of text by an integer count
    pub fn mul(&self, rhs: &Value) -> Result<Value, RuntimeFault> {
        match (self, rhs) {
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                let count = usize::try_from((*n).max(0)).unwrap_or(usize::MAX);
                match s.len().checked_mul(count) {
                    Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(count))),
                    _ => Err(RuntimeFault::StringTooLong {
                        limit: MAX_STRING_LEN,
                    }),
                }
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            _ => self.float_op(rhs, "*", |a, b| a * b),
        }
    }

    /// True division; the result is always float
    pub fn div(&self, rhs: &Value) -> Result<Value, RuntimeFault> {
        if rhs.as_float() == Some(0.0) {
            return Err(RuntimeFault::DivisionByZero);
        }
        self.float_op(rhs, "/", |a, b| a / b)
    }

    /// Arithmetic negation
    pub fn negate(&self) -> Result<Value, RuntimeFault> {
        match self {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(RuntimeFault::InvalidOperands {
                op: "UMINUS".to_string(),
                left: self.type_name().to_string(),
                right: "-".to_string(),
            }),
        }
    }

    /// Ordering between two numbers or two strings
    pub fn compare(&self, rhs: &Value, op: &str) -> Result<std::cmp::Ordering, RuntimeFault> {
        let ordering = match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) if matches!(op, "==" | "!=") => Some(a.cmp(b)),
            _ => match (self.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        };
        ordering.ok_or_else(|| self.mismatch(rhs, op))
    }

    fn float_op(
        &self,
        rhs: &Value,
        op: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, RuntimeFault> {
        match (self.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
            _ => Err(self.mismatch(rhs, op)),
        }
    }

    fn mismatch(&self, rhs: &Value, op: &str) -> RuntimeFault {
        RuntimeFault::InvalidOperands {
            op: op.to_string(),
            left: self.type_name().to_string(),
            right: rhs.type_name().to_string(),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

/// Text as `print` shows it: strings unquoted, floats always with a fraction
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(fl) => write!(f, "{:?}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}
