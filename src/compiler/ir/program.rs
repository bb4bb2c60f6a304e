//! Compiled program: quadruples plus the tables needed to run them

use serde::{Deserialize, Serialize};

use super::instruction::{Operand, Quadruple};
use crate::compiler::constants::ConstantPool;
use crate::compiler::memory::MemoryUsage;
use crate::compiler::symbols::{FunctionDirectory, Variable};
use crate::{Error, Result};

/// Complete compiled artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Program name from the `program` header
    pub name: String,
    /// Quadruples in execution order
    pub quadruples: Vec<Quadruple>,
    /// Interned literals
    pub constants: ConstantPool,
    /// Declared functions
    pub functions: FunctionDirectory,
    /// Global variables (for inspection after a run)
    pub globals: Vec<Variable>,
    /// Per-segment high-water marks
    pub memory: MemoryUsage,
}

impl Program {
    /// Create an empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a quadruple and return its index
    pub fn emit(&mut self, quad: Quadruple) -> usize {
        tracing::trace!(index = self.quadruples.len(), %quad, "emit");
        self.quadruples.push(quad);
        self.quadruples.len() - 1
    }

    /// Index the next emitted quadruple will receive
    pub fn next_index(&self) -> usize {
        self.quadruples.len()
    }

    /// Number of quadruples
    pub fn len(&self) -> usize {
        self.quadruples.len()
    }

    /// True if nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.quadruples.is_empty()
    }

    /// Resolve the pending result field of quadruple `index` to `target`.
    ///
    /// This is the only mutation allowed on an emitted quadruple, and it may
    /// happen once per quadruple.
    pub fn patch(&mut self, index: usize, target: usize) -> Result<()> {
        let quad = self
            .quadruples
            .get_mut(index)
            .ok_or_else(|| Error::internal(format!("backpatch of missing quadruple {}", index)))?;
        if !quad.is_pending() {
            return Err(Error::internal(format!(
                "quadruple {} ({}) is not awaiting a backpatch",
                index, quad
            )));
        }
        quad.result = Some(Operand::Target(target));
        tracing::trace!(index, target, "backpatch");
        Ok(())
    }

    /// Indices of quadruples whose target was never patched
    pub fn pending_jumps(&self) -> Vec<usize> {
        self.quadruples
            .iter()
            .enumerate()
            .filter(|(_, q)| q.is_pending())
            .map(|(i, _)| i)
            .collect()
    }

    /// Global variable by name
    pub fn global(&self, name: &str) -> Option<&Variable> {
        self.globals.iter().find(|v| v.name == name)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::MalformedArtifact {
            line: 0,
            message: e.to_string(),
        })
    }

    /// Deserialize from JSON produced by [`Program::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let mut program: Program =
            serde_json::from_str(json).map_err(|e| Error::MalformedArtifact {
                line: e.line(),
                message: e.to_string(),
            })?;
        program.constants.reindex();
        Ok(program)
    }
}
