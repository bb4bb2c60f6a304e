//! Constant pool: interns literal values to addresses in the constant segments

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::memory::{Address, Allocator, SegmentClass};
use super::types::ValueType;
use crate::Result;

/// Literal value as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal (unquoted, escapes resolved)
    String(String),
}

impl Literal {
    /// Static type of the literal
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Int(_) => ValueType::Int,
            Literal::Float(_) => ValueType::Float,
            Literal::String(_) => ValueType::String,
        }
    }

    fn key(&self) -> ConstKey {
        match self {
            Literal::Int(v) => ConstKey::Int(*v),
            Literal::Float(v) => ConstKey::Float(v.to_bits()),
            Literal::String(s) => ConstKey::String(s.clone()),
        }
    }
}

/// Hashable identity of a literal; floats compare by bit pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64),
    Float(u64),
    String(String),
}

/// One interned constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    /// Literal value
    pub value: Literal,
    /// Assigned address
    pub address: Address,
}

/// Interned literals in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    #[serde(skip)]
    by_value: HashMap<ConstKey, usize>,
    #[serde(skip)]
    by_address: HashMap<Address, usize>,
}

impl ConstantPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the address of `literal`, allocating one on first sight
    pub fn intern(&mut self, literal: Literal, allocator: &mut Allocator) -> Result<Address> {
        let key = literal.key();
        if let Some(&idx) = self.by_value.get(&key) {
            return Ok(self.entries[idx].address);
        }
        let address = allocator.allocate(SegmentClass::Constant, literal.value_type())?;
        self.insert(Constant {
            value: literal,
            address,
        });
        Ok(address)
    }

    /// Insert an already-addressed constant (used when loading an artifact)
    pub fn insert(&mut self, constant: Constant) {
        let idx = self.entries.len();
        self.by_value.insert(constant.value.key(), idx);
        self.by_address.insert(constant.address, idx);
        self.entries.push(constant);
    }

    /// Literal stored at `address`
    pub fn get(&self, address: Address) -> Option<&Literal> {
        self.by_address
            .get(&address)
            .map(|&idx| &self.entries[idx].value)
    }

    /// All constants in interning order
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    /// Number of interned constants
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was interned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild lookup indices after deserialization
    pub(crate) fn reindex(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.by_value.clear();
        self.by_address.clear();
        for constant in entries {
            self.insert(constant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_literals_share_an_address() {
        let mut alloc = Allocator::new();
        let mut pool = ConstantPool::new();
        let a = pool.intern(Literal::Int(3), &mut alloc).unwrap();
        let b = pool.intern(Literal::Int(3), &mut alloc).unwrap();
        let c = pool.intern(Literal::Int(4), &mut alloc).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Address(17000));
        assert_eq!(c, Address(17001));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_same_text_different_type_is_distinct() {
        let mut alloc = Allocator::new();
        let mut pool = ConstantPool::new();
        let int = pool.intern(Literal::Int(2), &mut alloc).unwrap();
        let float = pool.intern(Literal::Float(2.0), &mut alloc).unwrap();
        let text = pool
            .intern(Literal::String("2".to_string()), &mut alloc)
            .unwrap();
        assert_eq!(int, Address(17000));
        assert_eq!(float, Address(18000));
        assert_eq!(text, Address(19000));
        assert_eq!(pool.get(float), Some(&Literal::Float(2.0)));
    }
}
