//! Persisted intermediate form
//!
//! A line-oriented text artifact with one section per table. It carries
//! everything the virtual machine needs, so a program can be run again without
//! recompiling:
//!
//! ```text
//! %%PROGRAM demo
//! %%CONSTANTS
//! int:2=17000
//! string:"ab"=19000
//! %%FUNCTIONS
//! f:void:1:4000:a:int:7000;b:float:8000
//! %%QUADRUPLES
//! 0:GOTO:-:-:4
//! %%MEMORY_COUNTERS
//! global:int=1,float=0,string=0,void=1
//! %%GLOBALS
//! x:int:1000
//! %%END
//! ```

use std::fmt::Write as _;

use super::instruction::{Opcode, Operand, Quadruple};
use super::program::Program;
use crate::compiler::constants::{Constant, Literal};
use crate::compiler::memory::{Address, MemoryUsage, Segment, SegmentClass};
use crate::compiler::symbols::{Function, Param, ReturnKind, Scope, Variable};
use crate::compiler::types::ValueType;
use crate::{Error, Result};

const CLASSES: [SegmentClass; 4] = [
    SegmentClass::Global,
    SegmentClass::Local,
    SegmentClass::Temp,
    SegmentClass::Constant,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Constants,
    Functions,
    Quadruples,
    MemoryCounters,
    Globals,
    Done,
}

impl Program {
    /// Render the program as the persisted text artifact
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "%%PROGRAM {}", self.name);

        out.push_str("%%CONSTANTS\n");
        for constant in self.constants.iter() {
            let (ty, value) = match &constant.value {
                Literal::Int(v) => ("int", v.to_string()),
                Literal::Float(v) => ("float", format!("{:?}", v)),
                Literal::String(s) => (
                    "string",
                    serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s)),
                ),
            };
            let _ = writeln!(out, "{}:{}={}", ty, value, constant.address);
        }

        out.push_str("%%FUNCTIONS\n");
        for function in self.functions.iter() {
            let params: Vec<String> = function
                .params
                .iter()
                .map(|p| format!("{}:{}:{}", p.name, p.ty, p.address))
                .collect();
            let _ = writeln!(
                out,
                "{}:{}:{}:{}:{}",
                function.name,
                function.return_kind,
                function.entry,
                function.address,
                params.join(";")
            );
        }

        out.push_str("%%QUADRUPLES\n");
        for (i, quad) in self.quadruples.iter().enumerate() {
            let field = |o: &Option<Operand>| match o {
                Some(op) => op.to_string(),
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "{}:{}:{}:{}:{}",
                i,
                quad.op,
                field(&quad.arg1),
                field(&quad.arg2),
                field(&quad.result)
            );
        }

        out.push_str("%%MEMORY_COUNTERS\n");
        for class in CLASSES {
            let counts: Vec<String> = Segment::ALL
                .into_iter()
                .filter(|seg| seg.class() == class)
                .map(|seg| format!("{}={}", seg.value_type(), self.memory.count(seg)))
                .collect();
            let _ = writeln!(out, "{}:{}", class, counts.join(","));
        }

        out.push_str("%%GLOBALS\n");
        for var in &self.globals {
            let _ = writeln!(out, "{}:{}:{}", var.name, var.ty, var.address);
        }

        out.push_str("%%END\n");
        out
    }

    /// Rebuild a program from [`Program::to_text`] output
    pub fn from_text(text: &str) -> Result<Program> {
        let mut program = Program::new();
        let mut section = Section::Header;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            let malformed = |message: String| Error::MalformedArtifact {
                line: line_no,
                message,
            };

            if let Some(name) = line.strip_prefix("%%PROGRAM") {
                program.name = name.trim().to_string();
                continue;
            }
            let next = match line {
                "%%CONSTANTS" => Some(Section::Constants),
                "%%FUNCTIONS" => Some(Section::Functions),
                "%%QUADRUPLES" => Some(Section::Quadruples),
                "%%MEMORY_COUNTERS" => Some(Section::MemoryCounters),
                "%%GLOBALS" => Some(Section::Globals),
                "%%END" => Some(Section::Done),
                other if other.starts_with("%%") => {
                    return Err(malformed(format!("unknown section '{}'", other)))
                }
                _ => None,
            };
            if let Some(next) = next {
                section = next;
                continue;
            }

            match section {
                Section::Header | Section::Done => {
                    return Err(malformed("content outside of a section".to_string()))
                }
                Section::Constants => {
                    program.constants.insert(parse_constant(line).map_err(malformed)?)
                }
                Section::Functions => {
                    program.functions.insert(parse_function(line).map_err(malformed)?)
                }
                Section::Quadruples => {
                    let (index, quad) = parse_quadruple(line).map_err(malformed)?;
                    if index != program.quadruples.len() {
                        return Err(malformed(format!(
                            "quadruple index {} out of sequence (expected {})",
                            index,
                            program.quadruples.len()
                        )));
                    }
                    program.quadruples.push(quad);
                }
                Section::MemoryCounters => {
                    parse_counters(line, &mut program.memory).map_err(malformed)?
                }
                Section::Globals => program.globals.push(parse_global(line).map_err(malformed)?),
            }
        }

        if section != Section::Done {
            return Err(Error::MalformedArtifact {
                line: text.lines().count(),
                message: "missing %%END".to_string(),
            });
        }
        Ok(program)
    }
}

type ParseResult<T> = std::result::Result<T, String>;

fn parse_address(s: &str) -> ParseResult<Address> {
    s.parse::<u32>()
        .map(Address)
        .map_err(|_| format!("invalid address '{}'", s))
}

fn parse_type(s: &str) -> ParseResult<ValueType> {
    s.parse::<ValueType>()
}

fn parse_constant(line: &str) -> ParseResult<Constant> {
    let (ty, rest) = line
        .split_once(':')
        .ok_or_else(|| "constant needs 'type:value=address'".to_string())?;
    let (value, address) = rest
        .rsplit_once('=')
        .ok_or_else(|| "constant needs 'value=address'".to_string())?;
    let value = match parse_type(ty)? {
        ValueType::Int => Literal::Int(
            value
                .parse()
                .map_err(|_| format!("invalid int constant '{}'", value))?,
        ),
        ValueType::Float => Literal::Float(
            value
                .parse()
                .map_err(|_| format!("invalid float constant '{}'", value))?,
        ),
        ValueType::String => Literal::String(
            serde_json::from_str(value).map_err(|e| format!("invalid string constant: {}", e))?,
        ),
        other => return Err(format!("constants cannot have type '{}'", other)),
    };
    Ok(Constant {
        value,
        address: parse_address(address)?,
    })
}

fn parse_function(line: &str) -> ParseResult<Function> {
    let mut parts = line.splitn(5, ':');
    let name = parts.next().unwrap_or_default().to_string();
    let kind = parts.next().unwrap_or_default();
    let entry = parts.next().unwrap_or_default();
    let address = parse_address(parts.next().unwrap_or_default())?;
    if address.segment() != Some(Segment::GlobalVoid) {
        return Err(format!("function address {} is not in the global void segment", address));
    }
    let params = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err("function needs a name".to_string());
    }
    if kind != "void" {
        return Err(format!("unsupported return kind '{}'", kind));
    }
    let entry = entry
        .parse()
        .map_err(|_| format!("invalid entry index '{}'", entry))?;
    let params = params
        .split(';')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let fields: Vec<&str> = p.split(':').collect();
            match fields.as_slice() {
                [pname, ty, addr] => Ok(Param {
                    name: pname.to_string(),
                    ty: parse_type(ty)?,
                    address: parse_address(addr)?,
                }),
                _ => Err(format!("invalid parameter '{}'", p)),
            }
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Function {
        name,
        return_kind: ReturnKind::Void,
        params,
        entry,
        address,
    })
}

fn parse_quadruple(line: &str) -> ParseResult<(usize, Quadruple)> {
    let fields: Vec<&str> = line.splitn(5, ':').collect();
    let [index, op, arg1, arg2, result] = fields.as_slice() else {
        return Err("quadruple needs 'index:op:arg1:arg2:result'".to_string());
    };
    let index = index
        .parse()
        .map_err(|_| format!("invalid quadruple index '{}'", index))?;
    let op: Opcode = (*op).parse()?;

    let field = |raw: &str, as_target: bool, as_name: bool| -> ParseResult<Option<Operand>> {
        Ok(match raw {
            "-" => None,
            "?" => Some(Operand::Pending),
            _ if as_name => Some(Operand::Function(raw.to_string())),
            _ if as_target => Some(Operand::Target(
                raw.parse()
                    .map_err(|_| format!("invalid jump target '{}'", raw))?,
            )),
            _ => Some(Operand::Address(parse_address(raw)?)),
        })
    };

    let names_callee = matches!(op, Opcode::Sub | Opcode::Gosub);
    let result_is_target = op.is_jump() || op == Opcode::Gosub;
    Ok((
        index,
        Quadruple::new(
            op,
            field(*arg1, false, names_callee)?,
            field(*arg2, false, false)?,
            field(*result, result_is_target, false)?,
        ),
    ))
}

fn parse_counters(line: &str, usage: &mut MemoryUsage) -> ParseResult<()> {
    let (class, counts) = line
        .split_once(':')
        .ok_or_else(|| "counter line needs 'class:type=n,...'".to_string())?;
    let class = CLASSES
        .into_iter()
        .find(|c| c.to_string() == class)
        .ok_or_else(|| format!("unknown segment class '{}'", class))?;
    for pair in counts.split(',').filter(|p| !p.is_empty()) {
        let (ty, n) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid counter '{}'", pair))?;
        let segment = Segment::resolve(class, parse_type(ty)?)
            .ok_or_else(|| format!("no {} segment for '{}'", class, ty))?;
        let n: u32 = n.parse().map_err(|_| format!("invalid count '{}'", n))?;
        if n > 0 {
            usage.counts.push((segment, n));
        }
    }
    Ok(())
}

fn parse_global(line: &str) -> ParseResult<Variable> {
    let fields: Vec<&str> = line.split(':').collect();
    match fields.as_slice() {
        [name, ty, addr] => Ok(Variable {
            name: name.to_string(),
            ty: parse_type(ty)?,
            address: parse_address(addr)?,
            scope: Scope::Global,
        }),
        _ => Err(format!("invalid global '{}'", line)),
    }
}
