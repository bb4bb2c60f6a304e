//! Quadruple definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::compiler::memory::Address;
use crate::compiler::types::BinaryOp;

/// Operation tag of a quadruple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Arithmetic (result = arg1 op arg2)
    /// `+` addition or text concatenation
    Add,
    /// `-` subtraction
    Subtract,
    /// `*` multiplication or text repetition
    Multiply,
    /// `/` true division
    Divide,

    // Comparison (result is bool)
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

    // Copies
    /// `=`: result = arg1
    Assign,
    /// Unary minus: result = -arg1
    UMinus,

    // Control flow
    /// Unconditional jump to result
    Goto,
    /// Jump to result if arg1 is false
    GotoF,
    /// Jump to result if arg1 is true
    GotoT,

    // Calls
    /// Call marker naming the callee in arg1
    Sub,
    /// Stage arg1 into the callee slot named by result
    Param,
    /// Call function arg1 at entry result
    Gosub,
    /// Return from the current function
    EndFunc,

    // I/O
    /// Print the value at result
    Print,
    /// Halt
    End,
}

impl Opcode {
    /// Tag used in the persisted artifact
    pub fn tag(self) -> &'static str {
        match self {
            Opcode::Add => "+",
            Opcode::Subtract => "-",
            Opcode::Multiply => "*",
            Opcode::Divide => "/",
            Opcode::Gt => ">",
            Opcode::Lt => "<",
            Opcode::Ge => ">=",
            Opcode::Le => "<=",
            Opcode::Eq => "==",
            Opcode::Ne => "!=",
            Opcode::Assign => "=",
            Opcode::UMinus => "UMINUS",
            Opcode::Goto => "GOTO",
            Opcode::GotoF => "GOTOF",
            Opcode::GotoT => "GOTOT",
            Opcode::Sub => "SUB",
            Opcode::Param => "PARAM",
            Opcode::Gosub => "GOSUB",
            Opcode::EndFunc => "ENDFUNC",
            Opcode::Print => "PRINT",
            Opcode::End => "END",
        }
    }

    /// True for the three jump instructions
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Goto | Opcode::GotoF | Opcode::GotoT)
    }
}

impl From<BinaryOp> for Opcode {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Sub => Opcode::Subtract,
            BinaryOp::Mul => Opcode::Multiply,
            BinaryOp::Div => Opcode::Divide,
            BinaryOp::Gt => Opcode::Gt,
            BinaryOp::Lt => Opcode::Lt,
            BinaryOp::Ge => Opcode::Ge,
            BinaryOp::Le => Opcode::Le,
            BinaryOp::Eq => Opcode::Eq,
            BinaryOp::Ne => Opcode::Ne,
            BinaryOp::Assign => Opcode::Assign,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        const ALL: [Opcode; 21] = [
            Opcode::Add,
            Opcode::Subtract,
            Opcode::Multiply,
            Opcode::Divide,
            Opcode::Gt,
            Opcode::Lt,
            Opcode::Ge,
            Opcode::Le,
            Opcode::Eq,
            Opcode::Ne,
            Opcode::Assign,
            Opcode::UMinus,
            Opcode::Goto,
            Opcode::GotoF,
            Opcode::GotoT,
            Opcode::Sub,
            Opcode::Param,
            Opcode::Gosub,
            Opcode::EndFunc,
            Opcode::Print,
            Opcode::End,
        ];
        ALL.into_iter()
            .find(|op| op.tag() == s)
            .ok_or_else(|| format!("unknown opcode '{}'", s))
    }
}

/// One field of a quadruple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Memory address
    Address(Address),
    /// Instruction index
    Target(usize),
    /// Function name
    Function(String),
    /// Jump target not yet backpatched
    Pending,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Address(addr) => write!(f, "{}", addr),
            Operand::Target(idx) => write!(f, "{}", idx),
            Operand::Function(name) => f.write_str(name),
            Operand::Pending => f.write_str("?"),
        }
    }
}

/// Four-field intermediate instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadruple {
    /// Operation
    pub op: Opcode,
    /// First operand
    pub arg1: Option<Operand>,
    /// Second operand
    pub arg2: Option<Operand>,
    /// Destination, jump target or callee slot
    pub result: Option<Operand>,
}

impl Quadruple {
    /// Build a quadruple from its four fields
    pub fn new(
        op: Opcode,
        arg1: Option<Operand>,
        arg2: Option<Operand>,
        result: Option<Operand>,
    ) -> Self {
        Self {
            op,
            arg1,
            arg2,
            result,
        }
    }

    /// `op(left, right, dst)`
    pub fn binary(op: Opcode, left: Address, right: Address, dst: Address) -> Self {
        Self::new(
            op,
            Some(Operand::Address(left)),
            Some(Operand::Address(right)),
            Some(Operand::Address(dst)),
        )
    }

    /// `op(src, -, dst)`
    pub fn unary(op: Opcode, src: Address, dst: Address) -> Self {
        Self::new(
            op,
            Some(Operand::Address(src)),
            None,
            Some(Operand::Address(dst)),
        )
    }

    /// Jump with a pending target; `cond` is required for GOTOF/GOTOT
    pub fn jump(op: Opcode, cond: Option<Address>) -> Self {
        Self::new(op, cond.map(Operand::Address), None, Some(Operand::Pending))
    }

    /// Jump with a known target
    pub fn jump_to(op: Opcode, cond: Option<Address>, target: usize) -> Self {
        Self::new(
            op,
            cond.map(Operand::Address),
            None,
            Some(Operand::Target(target)),
        )
    }

    /// Instruction with no operands (`ENDFUNC`, `END`)
    pub fn bare(op: Opcode) -> Self {
        Self::new(op, None, None, None)
    }

    /// Jump target, if this is a patched jump
    pub fn target(&self) -> Option<usize> {
        match self.result {
            Some(Operand::Target(idx)) => Some(idx),
            _ => None,
        }
    }

    /// True if the result field still awaits a backpatch
    pub fn is_pending(&self) -> bool {
        matches!(self.result, Some(Operand::Pending))
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |o: &Option<Operand>| match o {
            Some(op) => op.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "{}({}, {}, {})",
            self.op,
            field(&self.arg1),
            field(&self.arg2),
            field(&self.result)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_tags_round_trip() {
        for tag in ["+", "UMINUS", "GOTOF", "SUB", "GOSUB", "ENDFUNC", "END"] {
            let op: Opcode = tag.parse().unwrap();
            assert_eq!(op.tag(), tag);
        }
        assert!("JMP".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_display() {
        let quad = Quadruple::binary(Opcode::Multiply, Address(17001), Address(17002), Address(12000));
        assert_eq!(quad.to_string(), "*(17001, 17002, 12000)");
        let jump = Quadruple::jump(Opcode::GotoF, Some(Address(14000)));
        assert_eq!(jump.to_string(), "GOTOF(14000, -, ?)");
        assert!(jump.is_pending());
    }
}
