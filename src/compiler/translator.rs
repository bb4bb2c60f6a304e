//! Syntax-directed translator
//!
//! Consumes [`Reduction`] events and emits quadruples in a single pass. All
//! per-compilation state lives in one [`Translator`] value: the evaluation
//! stacks, the symbol table, the function directory, the address allocator
//! and the program under construction.
//!
//! Semantic errors are accumulated. After an error the offending operand is
//! replaced by a value typed [`ValueType::Error`], which every later check
//! accepts silently so a single mistake is reported once.

use super::constants::Literal;
use super::ir::{Opcode, Operand, Program, Quadruple};
use super::memory::{Address, Allocator, SegmentClass};
use super::symbols::{Param, Scope, SymbolTable};
use super::types::{accepts_argument, check_binary, check_negate, BinaryOp, CubeResult, ValueType};
use super::Translation;
use crate::parser::{Reduction, ReductionSink};
use crate::{Error, Result};

/// Arguments collected for the call currently being marshaled
#[derive(Debug)]
struct CallContext {
    name: String,
    /// False when the callee was not declared; arguments are still consumed
    known: bool,
    args: Vec<(Address, ValueType)>,
}

/// Reduction-driven quadruple generator
#[derive(Debug)]
pub struct Translator {
    /// Reduced but unconsumed expression results
    operands: Vec<(Address, ValueType)>,
    /// Binary operators awaiting their right operand
    operators: Vec<BinaryOp>,
    /// Instruction indices awaiting a backpatch or serving as loop entries
    jumps: Vec<usize>,
    call: Option<CallContext>,
    /// `GOTO` over the function bodies, patched when `main` starts
    main_jump: Option<usize>,
    current_function: Option<String>,
    pending_params: Vec<Param>,
    symbols: SymbolTable,
    allocator: Allocator,
    program: Program,
    diagnostics: Vec<Error>,
}

impl Translator {
    /// Create a translator using full-size segments
    pub fn new() -> Self {
        Self::with_allocator(Allocator::new())
    }

    /// Create a translator drawing addresses from `allocator`
    pub fn with_allocator(allocator: Allocator) -> Self {
        Self {
            operands: Vec::new(),
            operators: Vec::new(),
            jumps: Vec::new(),
            call: None,
            main_jump: None,
            current_function: None,
            pending_params: Vec::new(),
            symbols: SymbolTable::new(),
            allocator,
            program: Program::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Semantic errors recorded so far
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    /// Program emitted so far
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Close the compilation.
    ///
    /// `upstream` carries lexical and syntax errors found before translation;
    /// they precede the semantic errors in the returned diagnostics. Leftover
    /// evaluation state or unpatched jumps are an internal error unless some
    /// error was already reported, in which case the input was incomplete.
    pub fn finish(mut self, upstream: Vec<Error>) -> Result<Translation> {
        let residue = !self.operands.is_empty()
            || !self.operators.is_empty()
            || !self.jumps.is_empty()
            || self.call.is_some()
            || self.main_jump.is_some();
        let pending = self.program.pending_jumps();

        if (residue || !pending.is_empty()) && upstream.is_empty() && self.diagnostics.is_empty() {
            return Err(Error::internal(format!(
                "translation ended with {} operand(s), {} operator(s), {} jump(s) on the stacks \
                 and unpatched quadruples {:?}",
                self.operands.len(),
                self.operators.len(),
                self.jumps.len(),
                pending
            )));
        }

        self.program.globals = self.symbols.variables(&Scope::Global).to_vec();
        self.program.memory = self.allocator.usage();

        let mut diagnostics = upstream;
        diagnostics.append(&mut self.diagnostics);
        tracing::debug!(
            quadruples = self.program.len(),
            constants = self.program.constants.len(),
            functions = self.program.functions.len(),
            errors = diagnostics.len(),
            "translation finished"
        );

        Ok(Translation {
            program: self.program,
            diagnostics,
        })
    }

    fn diagnose(&mut self, err: Error) {
        tracing::warn!(%err, "semantic error");
        self.diagnostics.push(err);
    }

    /// Record a non-fatal error and continue; propagate a fatal one
    fn absorb<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.diagnose(err);
                Ok(None)
            }
        }
    }

    fn emit(&mut self, quad: Quadruple) -> usize {
        self.program.emit(quad)
    }

    fn pop_operand(&mut self) -> Result<(Address, ValueType)> {
        self.operands
            .pop()
            .ok_or_else(|| Error::internal("operand stack underflow"))
    }

    /// Pop a pending jump; `None` only when the input already had errors
    fn pop_jump(&mut self) -> Result<Option<usize>> {
        match self.jumps.pop() {
            Some(index) => Ok(Some(index)),
            None if !self.diagnostics.is_empty() => Ok(None),
            None => Err(Error::internal("jump stack underflow")),
        }
    }

    fn patch_here(&mut self, index: usize) -> Result<()> {
        let here = self.program.next_index();
        self.program.patch(index, here)
    }

    /// Evaluation stacks must be empty between statements
    fn ensure_balanced(&mut self) -> Result<()> {
        if self.operands.is_empty() && self.operators.is_empty() && self.call.is_none() {
            return Ok(());
        }
        if self.diagnostics.is_empty() {
            return Err(Error::internal(format!(
                "unbalanced evaluation stacks at statement end: {} operand(s), {} operator(s)",
                self.operands.len(),
                self.operators.len()
            )));
        }
        self.clear_evaluation_state();
        Ok(())
    }

    fn clear_evaluation_state(&mut self) {
        self.operands.clear();
        self.operators.clear();
        self.call = None;
    }

    fn literal(&mut self, literal: Literal) -> Result<()> {
        let ty = literal.value_type();
        let address = self.program.constants.intern(literal, &mut self.allocator)?;
        self.operands.push((address, ty));
        Ok(())
    }

    fn temp(&mut self, ty: ValueType) -> Result<Address> {
        self.allocator.allocate(SegmentClass::Temp, ty)
    }

    // Declarations

    fn declare_variables(&mut self, names: Vec<String>, ty: ValueType) -> Result<()> {
        for name in names {
            tracing::trace!(name = %name, %ty, scope = %self.symbols.current_scope(), "declare");
            let declared = self.symbols.declare(&name, ty, &mut self.allocator);
            self.absorb(declared)?;
        }
        Ok(())
    }

    fn start_function(&mut self, name: String) -> Result<()> {
        if self.main_jump.is_none() && self.program.functions.is_empty() {
            let index = self.emit(Quadruple::jump(Opcode::Goto, None));
            self.main_jump = Some(index);
        }
        tracing::debug!(function = %name, "function start");
        self.symbols.enter_function(&name);
        self.allocator.rewind_local_and_temp();
        self.pending_params.clear();
        self.current_function = Some(name);
        Ok(())
    }

    fn declare_param(&mut self, name: String, ty: ValueType) -> Result<()> {
        let declared = self.symbols.declare(&name, ty, &mut self.allocator);
        if let Some(address) = self.absorb(declared)? {
            self.pending_params.push(Param { name, ty, address });
        }
        Ok(())
    }

    fn function_signature(&mut self) -> Result<()> {
        let name = self
            .current_function
            .clone()
            .ok_or_else(|| Error::internal("function signature outside a function"))?;
        let params = std::mem::take(&mut self.pending_params);
        let entry = self.program.next_index();
        let declared = self
            .program
            .functions
            .declare(&name, params, entry, &mut self.allocator)
            .map(|_| ());
        self.absorb(declared)?;
        Ok(())
    }

    fn end_function(&mut self) -> Result<()> {
        self.emit(Quadruple::bare(Opcode::EndFunc));
        self.symbols.exit_function();
        self.current_function = None;
        Ok(())
    }

    fn start_main(&mut self) -> Result<()> {
        tracing::debug!("main start");
        if let Some(index) = self.main_jump.take() {
            self.patch_here(index)?;
        }
        Ok(())
    }

    // Statements

    fn assign(&mut self, target: String) -> Result<()> {
        let (value, value_ty) = self.pop_operand()?;
        let Some(variable) = self.symbols.lookup(&target).cloned() else {
            self.diagnose(Error::UndeclaredVariable { name: target });
            return self.ensure_balanced();
        };
        match check_binary(BinaryOp::Assign, variable.ty, value_ty) {
            CubeResult::Valid(_) => {
                self.emit(Quadruple::unary(Opcode::Assign, value, variable.address));
            }
            CubeResult::Poisoned => {}
            CubeResult::Incompatible => self.diagnose(Error::TypeMismatch {
                op: BinaryOp::Assign.symbol().to_string(),
                left: variable.ty,
                right: value_ty,
            }),
        }
        self.ensure_balanced()
    }

    /// Pop a condition and report it if it is not boolean
    fn condition(&mut self, construct: &str) -> Result<Address> {
        let (address, ty) = self.pop_operand()?;
        if ty != ValueType::Bool && ty != ValueType::Error {
            self.diagnose(Error::NonBooleanCondition {
                construct: construct.to_string(),
                got: ty,
            });
        }
        Ok(address)
    }

    fn if_condition(&mut self) -> Result<()> {
        let cond = self.condition("if")?;
        let index = self.emit(Quadruple::jump(Opcode::GotoF, Some(cond)));
        self.jumps.push(index);
        Ok(())
    }

    fn else_branch(&mut self) -> Result<()> {
        let skip = self.emit(Quadruple::jump(Opcode::Goto, None));
        if let Some(false_jump) = self.pop_jump()? {
            self.patch_here(false_jump)?;
        }
        self.jumps.push(skip);
        Ok(())
    }

    fn if_end(&mut self) -> Result<()> {
        if let Some(index) = self.pop_jump()? {
            self.patch_here(index)?;
        }
        Ok(())
    }

    fn while_condition(&mut self) -> Result<()> {
        let cond = self.condition("while")?;
        let index = self.emit(Quadruple::jump(Opcode::GotoF, Some(cond)));
        self.jumps.push(index);
        Ok(())
    }

    fn while_end(&mut self) -> Result<()> {
        let exit = self.pop_jump()?;
        let entry = self.pop_jump()?;
        if let (Some(exit), Some(entry)) = (exit, entry) {
            self.emit(Quadruple::jump_to(Opcode::Goto, None, entry));
            self.patch_here(exit)?;
        }
        Ok(())
    }

    fn do_end(&mut self) -> Result<()> {
        let cond = self.condition("do-while")?;
        if let Some(entry) = self.pop_jump()? {
            self.emit(Quadruple::jump_to(Opcode::GotoT, Some(cond), entry));
        }
        Ok(())
    }

    fn call_start(&mut self, name: String) -> Result<()> {
        if self.call.is_some() {
            return Err(Error::internal(format!(
                "call to '{}' started while marshaling another call",
                name
            )));
        }
        let known = self.program.functions.get(&name).is_some();
        if known {
            self.emit(Quadruple::new(
                Opcode::Sub,
                Some(Operand::Function(name.clone())),
                None,
                None,
            ));
        } else {
            self.diagnose(Error::UndeclaredFunction { name: name.clone() });
        }
        self.call = Some(CallContext {
            name,
            known,
            args: Vec::new(),
        });
        Ok(())
    }

    fn call_argument(&mut self) -> Result<()> {
        let (address, ty) = self.pop_operand()?;
        let context = self
            .call
            .as_mut()
            .ok_or_else(|| Error::internal("call argument outside a call"))?;
        context.args.push((address, ty));
        let position = context.args.len();
        if !context.known || ty == ValueType::Error {
            return Ok(());
        }

        let expected = self
            .program
            .functions
            .get(&context.name)
            .and_then(|f| f.params.get(position - 1))
            .map(|p| p.ty);
        if let Some(expected) = expected {
            if !accepts_argument(expected, ty) {
                let function = context.name.clone();
                self.diagnose(Error::ParameterType {
                    function,
                    position,
                    expected,
                    got: ty,
                });
            }
        }
        Ok(())
    }

    fn call_end(&mut self) -> Result<()> {
        let context = self
            .call
            .take()
            .ok_or_else(|| Error::internal("call end outside a call"))?;
        if !context.known {
            return self.ensure_balanced();
        }
        let function = self
            .program
            .functions
            .get(&context.name)
            .cloned()
            .ok_or_else(|| Error::internal(format!("function '{}' vanished", context.name)))?;

        if context.args.len() != function.params.len() {
            self.diagnose(Error::ArityMismatch {
                function: function.name.clone(),
                expected: function.params.len(),
                got: context.args.len(),
            });
        } else {
            for ((address, ty), param) in context.args.iter().zip(&function.params) {
                if *ty == ValueType::Error {
                    continue;
                }
                self.emit(Quadruple::unary(Opcode::Param, *address, param.address));
            }
        }
        self.emit(Quadruple::new(
            Opcode::Gosub,
            Some(Operand::Function(function.name)),
            None,
            Some(Operand::Target(function.entry)),
        ));
        self.ensure_balanced()
    }

    fn print_item(&mut self) -> Result<()> {
        let (address, ty) = self.pop_operand()?;
        if ty != ValueType::Error {
            self.emit(Quadruple::new(
                Opcode::Print,
                None,
                None,
                Some(Operand::Address(address)),
            ));
        }
        self.ensure_balanced()
    }

    // Expressions

    fn identifier(&mut self, name: String) {
        match self.symbols.lookup(&name) {
            Some(variable) => {
                let operand = (variable.address, variable.ty);
                self.operands.push(operand);
            }
            None => {
                self.diagnose(Error::UndeclaredVariable { name });
                self.operands.push((Address::POISON, ValueType::Error));
            }
        }
    }

    fn binary(&mut self) -> Result<()> {
        let op = self
            .operators
            .pop()
            .ok_or_else(|| Error::internal("operator stack underflow"))?;
        let (right, right_ty) = self.pop_operand()?;
        let (left, left_ty) = self.pop_operand()?;

        match check_binary(op, left_ty, right_ty) {
            CubeResult::Valid(ty) => {
                let dst = self.temp(ty)?;
                self.emit(Quadruple::binary(op.into(), left, right, dst));
                self.operands.push((dst, ty));
            }
            CubeResult::Poisoned => self.operands.push((left, ValueType::Error)),
            CubeResult::Incompatible => {
                self.diagnose(Error::TypeMismatch {
                    op: op.symbol().to_string(),
                    left: left_ty,
                    right: right_ty,
                });
                self.operands.push((left, ValueType::Error));
            }
        }
        Ok(())
    }

    fn negate(&mut self) -> Result<()> {
        let (src, ty) = self.pop_operand()?;
        match check_negate(ty) {
            CubeResult::Valid(result) => {
                let dst = self.temp(result)?;
                self.emit(Quadruple::unary(Opcode::UMinus, src, dst));
                self.operands.push((dst, result));
            }
            CubeResult::Poisoned => self.operands.push((src, ValueType::Error)),
            CubeResult::Incompatible => {
                self.diagnose(Error::UnaryMismatch {
                    op: "-".to_string(),
                    operand: ty,
                });
                self.operands.push((src, ValueType::Error));
            }
        }
        Ok(())
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReductionSink for Translator {
    fn reduce(&mut self, event: Reduction) -> Result<()> {
        tracing::trace!(?event, "reduce");
        match event {
            Reduction::ProgramStart { name } => {
                tracing::debug!(program = %name, "translation start");
                self.program.name = name;
                Ok(())
            }
            Reduction::VarDecl { names, ty } => self.declare_variables(names, ty),
            Reduction::FunctionStart { name } => self.start_function(name),
            Reduction::Param { name, ty } => self.declare_param(name, ty),
            Reduction::FunctionSignature => self.function_signature(),
            Reduction::FunctionEnd => self.end_function(),
            Reduction::MainStart => self.start_main(),
            Reduction::ProgramEnd => {
                self.emit(Quadruple::bare(Opcode::End));
                Ok(())
            }

            Reduction::Assign { target } => self.assign(target),
            Reduction::IfCondition => self.if_condition(),
            Reduction::Else => self.else_branch(),
            Reduction::IfEnd => self.if_end(),
            Reduction::WhileStart | Reduction::DoStart => {
                let here = self.program.next_index();
                self.jumps.push(here);
                Ok(())
            }
            Reduction::WhileCondition => self.while_condition(),
            Reduction::WhileEnd => self.while_end(),
            Reduction::DoEnd => self.do_end(),
            Reduction::CallStart { name } => self.call_start(name),
            Reduction::CallArgument => self.call_argument(),
            Reduction::CallEnd => self.call_end(),
            Reduction::PrintItem => self.print_item(),

            Reduction::Identifier(name) => {
                self.identifier(name);
                Ok(())
            }
            Reduction::IntLiteral(value) => self.literal(Literal::Int(value)),
            Reduction::FloatLiteral(value) => self.literal(Literal::Float(value)),
            Reduction::StringLiteral(value) => self.literal(Literal::String(value)),
            Reduction::Operator(op) => {
                self.operators.push(op);
                Ok(())
            }
            Reduction::Binary => self.binary(),
            Reduction::Negate => self.negate(),

            Reduction::Recover => {
                self.clear_evaluation_state();
                Ok(())
            }
        }
    }
}
