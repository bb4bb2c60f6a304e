//! Virtual machine for compiled Little Duck programs

mod environment;
mod value;
mod vm;

pub use environment::{Environment, Frame, TempStorage};
pub use value::{Value, MAX_STRING_LEN};
pub use vm::{ExecutionReport, VirtualMachine, VmOptions};
