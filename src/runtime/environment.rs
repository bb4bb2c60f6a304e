use std::collections::HashMap;

use crate::compiler::{Address, Program, SegmentClass, ValueType};
use crate::error::RuntimeFault;
use crate::runtime::Value;

/// Where temporaries live while a call is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempStorage {
    /// Every activation record owns its temporaries; a caller's pending
    /// temporaries survive the call
    #[default]
    PerFrame,
    /// One temporary store shared by all frames and wiped on every call
    SharedClearedOnCall,
}

/// Activation record: local and temporary storage of one live call
#[derive(Debug, Clone, Default)]
pub struct Frame {
    locals: HashMap<Address, Value>,
    temps: HashMap<Address, Value>,
}

/// Runtime storage for every segment
///
/// Local and temporary addresses are frame-relative: the same number names a
/// different cell in each activation record, so they are always resolved
/// against the frame on top of the stack.
#[derive(Debug, Clone)]
pub struct Environment {
    globals: HashMap<Address, Value>,
    /// Interned constants, read-only
    constants: HashMap<Address, Value>,
    /// Stack of activation records; the bottom one belongs to `main`
    frames: Vec<Frame>,
    shared_temps: HashMap<Address, Value>,
    temp_storage: TempStorage,
}

impl Environment {
    /// Creates storage for `program` with its constants loaded
    pub fn new(program: &Program, temp_storage: TempStorage) -> Self {
        let constants = program
            .constants
            .iter()
            .map(|c| (c.address, Value::from(&c.value)))
            .collect();
        Environment {
            globals: HashMap::new(),
            constants,
            frames: vec![Frame::default()],
            shared_temps: HashMap::new(),
            temp_storage,
        }
    }

    /// Number of live activation records, including `main`'s
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Enters a new activation record
    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
        if self.temp_storage == TempStorage::SharedClearedOnCall {
            self.shared_temps.clear();
        }
    }

    /// Leaves the current activation record; `main`'s record is never popped
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Reads an address; cells never written hold their type's zero value
    pub fn read(&self, address: Address) -> Result<Value, RuntimeFault> {
        let segment = address.segment().ok_or(RuntimeFault::InvalidAddress(address))?;
        let stored = match segment.class() {
            SegmentClass::Constant => {
                return self
                    .constants
                    .get(&address)
                    .cloned()
                    .ok_or(RuntimeFault::MissingConstant(address));
            }
            SegmentClass::Global => self.globals.get(&address),
            SegmentClass::Local => self.frame().locals.get(&address),
            SegmentClass::Temp => match self.temp_storage {
                TempStorage::PerFrame => self.frame().temps.get(&address),
                TempStorage::SharedClearedOnCall => self.shared_temps.get(&address),
            },
        };
        match stored {
            Some(value) => Ok(value.clone()),
            None => Value::default_for(segment.value_type())
                .ok_or(RuntimeFault::InvalidAddress(address)),
        }
    }

    /// Writes an address, widening integers stored into float segments
    pub fn write(&mut self, address: Address, value: Value) -> Result<(), RuntimeFault> {
        let segment = address.segment().ok_or(RuntimeFault::InvalidAddress(address))?;
        let value = match segment.value_type() {
            ValueType::Float => value.widen_to_float(),
            ValueType::Void => return Err(RuntimeFault::InvalidAddress(address)),
            _ => value,
        };
        let cells = match segment.class() {
            SegmentClass::Constant => return Err(RuntimeFault::ConstantWrite(address)),
            SegmentClass::Global => &mut self.globals,
            SegmentClass::Local => &mut self.frame_mut().locals,
            SegmentClass::Temp => match self.temp_storage {
                TempStorage::PerFrame => &mut self.frame_mut().temps,
                TempStorage::SharedClearedOnCall => &mut self.shared_temps,
            },
        };
        cells.insert(address, value);
        Ok(())
    }

    fn frame(&self) -> &Frame {
        // frames is never empty: pop_frame keeps the bottom record
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(temp_storage: TempStorage) -> Environment {
        Environment::new(&Program::new(), temp_storage)
    }

    #[test]
    fn test_unwritten_cells_read_as_zero() {
        let env = env(TempStorage::PerFrame);
        assert_eq!(env.read(Address(1000)).unwrap(), Value::Int(0));
        assert_eq!(env.read(Address(8001)).unwrap(), Value::Float(0.0));
        assert_eq!(env.read(Address(9000)).unwrap(), Value::String(String::new()));
        assert_eq!(env.read(Address(14000)).unwrap(), Value::Bool(false));
        assert_eq!(
            env.read(Address(17000)),
            Err(RuntimeFault::MissingConstant(Address(17000)))
        );
        assert_eq!(
            env.read(Address(50)),
            Err(RuntimeFault::InvalidAddress(Address(50)))
        );
    }

    #[test]
    fn test_float_segments_widen_ints() {
        let mut env = env(TempStorage::PerFrame);
        env.write(Address(2000), Value::Int(3)).unwrap();
        assert_eq!(env.read(Address(2000)).unwrap(), Value::Float(3.0));
        assert_eq!(
            env.write(Address(17000), Value::Int(1)),
            Err(RuntimeFault::ConstantWrite(Address(17000)))
        );
    }

    #[test]
    fn test_locals_are_frame_relative() {
        let mut env = env(TempStorage::PerFrame);
        env.write(Address(7000), Value::Int(1)).unwrap();
        env.write(Address(1000), Value::Int(9)).unwrap();
        env.push_frame();
        assert_eq!(env.read(Address(7000)).unwrap(), Value::Int(0));
        env.write(Address(7000), Value::Int(2)).unwrap();
        assert_eq!(env.read(Address(1000)).unwrap(), Value::Int(9));
        env.pop_frame();
        assert_eq!(env.read(Address(7000)).unwrap(), Value::Int(1));
        assert_eq!(env.depth(), 1);
        env.pop_frame();
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn test_temp_storage_policies() {
        let mut per_frame = env(TempStorage::PerFrame);
        per_frame.write(Address(12000), Value::Int(5)).unwrap();
        per_frame.push_frame();
        per_frame.pop_frame();
        assert_eq!(per_frame.read(Address(12000)).unwrap(), Value::Int(5));

        let mut shared = env(TempStorage::SharedClearedOnCall);
        shared.write(Address(12000), Value::Int(5)).unwrap();
        shared.push_frame();
        shared.pop_frame();
        assert_eq!(shared.read(Address(12000)).unwrap(), Value::Int(0));
    }
}
