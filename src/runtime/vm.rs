use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::compiler::{Address, Opcode, Operand, Program, Quadruple};
use crate::error::{Error, Result, RuntimeFault};
use crate::runtime::{Environment, TempStorage, Value};

/// Virtual machine options
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Live calls allowed before a `StackOverflow` fault
    pub max_call_depth: usize,
    /// Temporary storage policy across calls
    pub temp_storage: TempStorage,
    /// Also write every `PRINT` line to stdout
    pub echo: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
            temp_storage: TempStorage::PerFrame,
            echo: false,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// One entry per executed `PRINT`
    pub output: Vec<String>,
    /// Instructions executed
    pub steps: u64,
}

/// Fetch-execute interpreter over a compiled [`Program`]
///
/// The program must come from a translation without errors; the machine
/// does not re-check types and reports any inconsistency it meets as a
/// [`RuntimeFault`].
pub struct VirtualMachine<'p> {
    program: &'p Program,
    options: VmOptions,
    env: Environment,
    ip: usize,
    /// Return addresses of the live calls
    call_stack: Vec<usize>,
    /// Values staged by `PARAM` for the next `GOSUB`
    staged: Vec<(Address, Value)>,
    output: Vec<String>,
    steps: u64,
    halted: bool,
}

impl<'p> VirtualMachine<'p> {
    /// Creates a machine with default options
    pub fn new(program: &'p Program) -> Self {
        Self::with_options(program, VmOptions::default())
    }

    /// Creates a machine with explicit options
    pub fn with_options(program: &'p Program, options: VmOptions) -> Self {
        let env = Environment::new(program, options.temp_storage);
        Self {
            program,
            options,
            env,
            ip: 0,
            call_stack: Vec::new(),
            staged: Vec::new(),
            output: Vec::new(),
            steps: 0,
            halted: false,
        }
    }

    /// Runs the program from instruction 0 until it halts.
    ///
    /// Every run starts from fresh storage. A fault aborts the run and
    /// reports the index of the offending instruction.
    pub fn run(&mut self) -> Result<ExecutionReport> {
        self.reset();
        tracing::debug!(program = %self.program.name, quadruples = self.program.len(), "run start");

        let program = self.program;
        while !self.halted {
            let Some(quad) = program.quadruples.get(self.ip) else {
                // Falling off the end behaves like END
                break;
            };
            tracing::trace!(ip = self.ip, %quad, "execute");
            self.steps += 1;
            let ip = self.ip;
            self.execute(quad).map_err(|fault| {
                tracing::debug!(ip, %fault, "runtime fault");
                Error::runtime(ip, fault)
            })?;
        }

        tracing::debug!(steps = self.steps, lines = self.output.len(), "run finished");
        Ok(ExecutionReport {
            output: std::mem::take(&mut self.output),
            steps: self.steps,
        })
    }

    /// Value of a global variable after (or during) a run
    pub fn global_value(&self, name: &str) -> Option<Value> {
        let variable = self.program.global(name)?;
        self.env.read(variable.address).ok()
    }

    /// Reads an address in the current frame
    pub fn read(&self, address: Address) -> Result<Value> {
        self.env
            .read(address)
            .map_err(|fault| Error::runtime(self.ip, fault))
    }

    fn reset(&mut self) {
        self.env = Environment::new(self.program, self.options.temp_storage);
        self.ip = 0;
        self.call_stack.clear();
        self.staged.clear();
        self.output.clear();
        self.steps = 0;
        self.halted = false;
    }

    fn execute(&mut self, quad: &Quadruple) -> std::result::Result<(), RuntimeFault> {
        match quad.op {
            Opcode::Add
            | Opcode::Subtract
            | Opcode::Multiply
            | Opcode::Divide
            | Opcode::Gt
            | Opcode::Lt
            | Opcode::Ge
            | Opcode::Le
            | Opcode::Eq
            | Opcode::Ne => {
                let left = self.env.read(address(&quad.arg1, quad)?)?;
                let right = self.env.read(address(&quad.arg2, quad)?)?;
                let value = binary(quad.op, &left, &right)?;
                self.env.write(address(&quad.result, quad)?, value)?;
            }
            Opcode::Assign => {
                let value = self.env.read(address(&quad.arg1, quad)?)?;
                self.env.write(address(&quad.result, quad)?, value)?;
            }
            Opcode::UMinus => {
                let value = self.env.read(address(&quad.arg1, quad)?)?.negate()?;
                self.env.write(address(&quad.result, quad)?, value)?;
            }

            Opcode::Goto => {
                self.ip = self.target(quad)?;
                return Ok(());
            }
            Opcode::GotoF | Opcode::GotoT => {
                let value = self.env.read(address(&quad.arg1, quad)?)?;
                let Value::Bool(cond) = value else {
                    return Err(RuntimeFault::InvalidOperands {
                        op: quad.op.to_string(),
                        left: value.type_name().to_string(),
                        right: "-".to_string(),
                    });
                };
                if cond == (quad.op == Opcode::GotoT) {
                    self.ip = self.target(quad)?;
                    return Ok(());
                }
            }

            Opcode::Sub => {
                let name = function(&quad.arg1, quad)?;
                if self.program.functions.get(name).is_none() {
                    return Err(RuntimeFault::MalformedInstruction(format!(
                        "unknown function '{}'",
                        name
                    )));
                }
                self.staged.clear();
            }
            Opcode::Param => {
                let value = self.env.read(address(&quad.arg1, quad)?)?;
                self.staged.push((address(&quad.result, quad)?, value));
            }
            Opcode::Gosub => {
                function(&quad.arg1, quad)?;
                let entry = self.target(quad)?;
                if self.call_stack.len() >= self.options.max_call_depth {
                    return Err(RuntimeFault::StackOverflow {
                        limit: self.options.max_call_depth,
                    });
                }
                self.call_stack.push(self.ip + 1);
                self.env.push_frame();
                for (address, value) in std::mem::take(&mut self.staged) {
                    self.env.write(address, value)?;
                }
                self.ip = entry;
                return Ok(());
            }
            Opcode::EndFunc => match self.call_stack.pop() {
                Some(ret) => {
                    self.env.pop_frame();
                    self.ip = ret;
                    return Ok(());
                }
                None => self.halted = true,
            },

            Opcode::Print => {
                let line = self.env.read(address(&quad.result, quad)?)?.to_string();
                if self.options.echo {
                    println!("{}", line);
                }
                self.output.push(line);
            }
            Opcode::End => self.halted = true,
        }

        self.ip += 1;
        Ok(())
    }

    fn target(&self, quad: &Quadruple) -> std::result::Result<usize, RuntimeFault> {
        match quad.result {
            Some(Operand::Target(index)) if index <= self.program.len() => Ok(index),
            Some(Operand::Pending) => Err(RuntimeFault::MalformedInstruction(format!(
                "unpatched jump in {}",
                quad
            ))),
            _ => Err(RuntimeFault::MalformedInstruction(format!(
                "invalid jump target in {}",
                quad
            ))),
        }
    }
}

fn address(field: &Option<Operand>, quad: &Quadruple) -> std::result::Result<Address, RuntimeFault> {
    match field {
        Some(Operand::Address(address)) => Ok(*address),
        _ => Err(RuntimeFault::MalformedInstruction(format!(
            "expected an address operand in {}",
            quad
        ))),
    }
}

fn function<'q>(
    field: &'q Option<Operand>,
    quad: &Quadruple,
) -> std::result::Result<&'q str, RuntimeFault> {
    match field {
        Some(Operand::Function(name)) => Ok(name),
        _ => Err(RuntimeFault::MalformedInstruction(format!(
            "expected a function name in {}",
            quad
        ))),
    }
}

fn binary(op: Opcode, left: &Value, right: &Value) -> std::result::Result<Value, RuntimeFault> {
    let tag = op.tag();
    let holds = |accept: fn(Ordering) -> bool| -> std::result::Result<Value, RuntimeFault> {
        Ok(Value::Bool(accept(left.compare(right, tag)?)))
    };
    match op {
        Opcode::Add => left.add(right),
        Opcode::Subtract => left.sub(right),
        Opcode::Multiply => left.mul(right),
        Opcode::Divide => left.div(right),
        Opcode::Gt => holds(Ordering::is_gt),
        Opcode::Lt => holds(Ordering::is_lt),
        Opcode::Ge => holds(Ordering::is_ge),
        Opcode::Le => holds(Ordering::is_le),
        Opcode::Eq => holds(Ordering::is_eq),
        Opcode::Ne => holds(Ordering::is_ne),
        other => Err(RuntimeFault::MalformedInstruction(format!(
            "{} is not a binary operator",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, Compiler};

    fn compile(source: &str) -> Program {
        Compiler::new(CompileOptions::default())
            .compile(source)
            .unwrap()
    }

    #[test]
    fn test_arithmetic_program() {
        let program = compile("program p; var x: int; main { x = 2 + 3 * 4; } end");
        let mut vm = VirtualMachine::new(&program);
        let report = vm.run().unwrap();
        assert_eq!(vm.global_value("x"), Some(Value::Int(14)));
        assert_eq!(report.steps, 4);
    }

    #[test]
    fn test_print_output() {
        let program = compile(
            "program p; var f: float; main { f = 4 / 2; print(f, \"ab\" * 3, 1 < 2, -f); } end",
        );
        let report = VirtualMachine::new(&program).run().unwrap();
        assert_eq!(report.output, vec!["2.0", "ababab", "true", "-2.0"]);
    }

    #[test]
    fn test_division_by_zero_reports_instruction() {
        let program = compile("program p; var x: float; main { x = 5 / 0; } end");
        let err = VirtualMachine::new(&program).run().unwrap_err();
        assert_eq!(err, Error::runtime(0, RuntimeFault::DivisionByZero));
    }

    #[test]
    fn test_recursion_limit() {
        let program = compile(
            "program p; void f() [ { f(); } ]; main { f(); } end",
        );
        let options = VmOptions {
            max_call_depth: 50,
            ..VmOptions::default()
        };
        let err = VirtualMachine::with_options(&program, options).run().unwrap_err();
        assert!(matches!(
            err,
            Error::RuntimeError {
                fault: RuntimeFault::StackOverflow { limit: 50 },
                ..
            }
        ));
    }

    #[test]
    fn test_unpatched_jump_is_a_fault() {
        let mut program = Program::new();
        program.emit(Quadruple::jump(Opcode::Goto, None));
        let err = VirtualMachine::new(&program).run().unwrap_err();
        assert!(matches!(
            err,
            Error::RuntimeError {
                ip: 0,
                fault: RuntimeFault::MalformedInstruction(_)
            }
        ));
    }

    #[test]
    fn test_runs_are_independent() {
        let program = compile("program p; var x: int; main { x = x + 1; } end");
        let mut vm = VirtualMachine::new(&program);
        vm.run().unwrap();
        vm.run().unwrap();
        assert_eq!(vm.global_value("x"), Some(Value::Int(1)));
    }
}
