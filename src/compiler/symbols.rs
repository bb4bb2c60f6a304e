//! Symbol table and function directory
//!
//! Scoping has exactly two levels: `global` and the function currently being
//! compiled. Lookup tries the current function first and falls back to global.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::memory::{Address, Allocator, Segment, SegmentClass};
use super::types::ValueType;
use crate::{Error, Result};

/// Owning scope of a variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Program-wide scope (also holds `main`'s variables)
    Global,
    /// Local scope of the named function
    Function(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Function(name) => f.write_str(name),
        }
    }
}

/// Declared variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Source name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Assigned address
    pub address: Address,
    /// Owning scope
    pub scope: Scope,
}

/// Variables of every scope seen so far
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: HashMap<Scope, Vec<Variable>>,
    current: Scope,
}

impl SymbolTable {
    /// Create a table positioned in the global scope
    pub fn new() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(Scope::Global, Vec::new());
        Self {
            scopes,
            current: Scope::Global,
        }
    }

    /// Scope new declarations go into
    pub fn current_scope(&self) -> &Scope {
        &self.current
    }

    /// Open (or reopen) a function scope; existing entries are discarded
    pub fn enter_function(&mut self, name: &str) {
        let scope = Scope::Function(name.to_string());
        self.scopes.insert(scope.clone(), Vec::new());
        self.current = scope;
    }

    /// Return to the global scope
    pub fn exit_function(&mut self) {
        self.current = Scope::Global;
    }

    /// Declare `name` in the current scope, allocating its address.
    ///
    /// Fails with [`Error::Redeclaration`] (leaving the first binding intact) or,
    /// fatally, with [`Error::AllocationOverflow`].
    pub fn declare(
        &mut self,
        name: &str,
        ty: ValueType,
        allocator: &mut Allocator,
    ) -> Result<Address> {
        let scope = self.current.clone();
        let class = match scope {
            Scope::Global => SegmentClass::Global,
            Scope::Function(_) => SegmentClass::Local,
        };
        let vars = self.scopes.entry(scope.clone()).or_default();
        if vars.iter().any(|v| v.name == name) {
            return Err(Error::Redeclaration {
                name: name.to_string(),
                scope: scope.to_string(),
            });
        }
        let address = allocator.allocate(class, ty)?;
        vars.push(Variable {
            name: name.to_string(),
            ty,
            address,
            scope,
        });
        Ok(address)
    }

    /// Resolve `name` in the current scope, then global
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        let find = |scope: &Scope| {
            self.scopes
                .get(scope)
                .and_then(|vars| vars.iter().find(|v| v.name == name))
        };
        find(&self.current).or_else(|| find(&Scope::Global))
    }

    /// Variables declared in `scope`, in declaration order
    pub fn variables(&self, scope: &Scope) -> &[Variable] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Return kind of a function; only `void` exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    /// No return value
    Void,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("void")
    }
}

/// Formal parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Local address the caller writes with `PARAM`
    pub address: Address,
}

/// Function signature and entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Always `void`
    pub return_kind: ReturnKind,
    /// Ordered formal parameters
    pub params: Vec<Param>,
    /// Index of the first instruction of the body
    pub entry: usize,
    /// Identity slot in the global-void segment
    pub address: Address,
}

/// Declared functions in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDirectory {
    functions: Vec<Function>,
}

impl FunctionDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a function whose body begins at instruction `entry`
    pub fn declare(
        &mut self,
        name: &str,
        params: Vec<Param>,
        entry: usize,
        allocator: &mut Allocator,
    ) -> Result<&Function> {
        if self.get(name).is_some() {
            return Err(Error::DuplicateFunction {
                name: name.to_string(),
            });
        }
        let address = allocator.allocate_in(Segment::GlobalVoid)?;
        self.insert(Function {
            name: name.to_string(),
            return_kind: ReturnKind::Void,
            params,
            entry,
            address,
        });
        Ok(&self.functions[self.functions.len() - 1])
    }

    /// Insert a fully-built function (used when loading an artifact)
    pub fn insert(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Function named `name`
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// All functions in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Number of declared functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if no function was declared
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_then_lookup() {
        let mut alloc = Allocator::new();
        let mut table = SymbolTable::new();
        let addr = table.declare("x", ValueType::Int, &mut alloc).unwrap();
        let var = table.lookup("x").unwrap();
        assert_eq!(var.address, addr);
        assert_eq!(var.ty, ValueType::Int);
        assert_eq!(var.scope, Scope::Global);
    }

    #[test]
    fn test_redeclaration_keeps_original_binding() {
        let mut alloc = Allocator::new();
        let mut table = SymbolTable::new();
        let first = table.declare("x", ValueType::Int, &mut alloc).unwrap();
        let err = table
            .declare("x", ValueType::Float, &mut alloc)
            .unwrap_err();
        assert!(matches!(err, Error::Redeclaration { ref name, .. } if name == "x"));
        let var = table.lookup("x").unwrap();
        assert_eq!(var.address, first);
        assert_eq!(var.ty, ValueType::Int);
    }

    #[test]
    fn test_function_scope_falls_back_to_global() {
        let mut alloc = Allocator::new();
        let mut table = SymbolTable::new();
        table.declare("g", ValueType::Float, &mut alloc).unwrap();
        table.enter_function("f");
        let local = table.declare("a", ValueType::Int, &mut alloc).unwrap();
        assert_eq!(local, Address(7000));
        assert_eq!(table.lookup("g").unwrap().address, Address(2000));
        assert_eq!(table.lookup("a").unwrap().address, Address(7000));

        table.exit_function();
        assert!(table.lookup("a").is_none());
        assert_eq!(table.variables(&Scope::Function("f".to_string())).len(), 1);
    }

    #[test]
    fn test_current_scope_follows_function_entry() {
        let mut table = SymbolTable::new();
        assert_eq!(table.current_scope(), &Scope::Global);
        table.enter_function("f");
        assert_eq!(table.current_scope(), &Scope::Function("f".to_string()));
        assert_eq!(table.current_scope().to_string(), "f");
        table.exit_function();
        assert_eq!(table.current_scope().to_string(), "global");
    }

    #[test]
    fn test_same_name_in_different_scopes() {
        let mut alloc = Allocator::new();
        let mut table = SymbolTable::new();
        table.declare("n", ValueType::Int, &mut alloc).unwrap();
        table.enter_function("f");
        assert!(table.declare("n", ValueType::String, &mut alloc).is_ok());
        assert_eq!(table.lookup("n").unwrap().ty, ValueType::String);
    }

    #[test]
    fn test_duplicate_function() {
        let mut alloc = Allocator::new();
        let mut dir = FunctionDirectory::new();
        let f = dir.declare("f", Vec::new(), 1, &mut alloc).unwrap();
        assert_eq!(f.address, Address(4000));
        assert_eq!(f.entry, 1);
        let err = dir.declare("f", Vec::new(), 5, &mut alloc).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateFunction {
                name: "f".to_string()
            }
        );
        assert_eq!(dir.get("f").unwrap().entry, 1);
    }
}
