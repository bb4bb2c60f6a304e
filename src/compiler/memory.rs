//! # Segmented virtual memory
//!
//! Every variable, temporary and constant lives at a numeric [`Address`]. The
//! address space is cut into fixed, disjoint ranges keyed by lifetime class and
//! value type. The segment of an address is decided purely by range membership,
//! which is all the virtual machine needs to route a read or a write.
//!
//! ```text
//! global   int 1000  float 2000  string 3000  void 4000
//! local    int 7000  float 8000  string 9000
//! temp     int 12000 float 13000 bool 14000   string 15000
//! constant int 17000 float 18000 string 19000
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::ValueType;
use crate::{Error, Result};

/// Number of addresses in every segment
pub const SEGMENT_SIZE: u32 = 1000;

/// Virtual memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u32);

impl Address {
    /// Placeholder carried by poisoned operands; lies outside every segment
    pub const POISON: Address = Address(0);

    /// Segment containing this address, if any
    pub fn segment(self) -> Option<Segment> {
        Segment::of(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifetime class of a storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentClass {
    /// Program-wide variables
    Global,
    /// Function parameters and locals, frame-relative at runtime
    Local,
    /// Expression temporaries, frame-relative at runtime
    Temp,
    /// Interned literals, read-only
    Constant,
}

impl fmt::Display for SegmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentClass::Global => "global",
            SegmentClass::Local => "local",
            SegmentClass::Temp => "temp",
            SegmentClass::Constant => "const",
        })
    }
}

/// One fixed address range dedicated to a (class, type) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Global ints
    GlobalInt,
    /// Global floats
    GlobalFloat,
    /// Global strings
    GlobalString,
    /// Function identity slots
    GlobalVoid,
    /// Local ints
    LocalInt,
    /// Local floats
    LocalFloat,
    /// Local strings
    LocalString,
    /// Integer temporaries
    TempInt,
    /// Float temporaries
    TempFloat,
    /// Boolean temporaries
    TempBool,
    /// String temporaries
    TempString,
    /// Integer constants
    ConstInt,
    /// Float constants
    ConstFloat,
    /// String constants
    ConstString,
}

impl Segment {
    /// All segments in address order
    pub const ALL: [Segment; 14] = [
        Segment::GlobalInt,
        Segment::GlobalFloat,
        Segment::GlobalString,
        Segment::GlobalVoid,
        Segment::LocalInt,
        Segment::LocalFloat,
        Segment::LocalString,
        Segment::TempInt,
        Segment::TempFloat,
        Segment::TempBool,
        Segment::TempString,
        Segment::ConstInt,
        Segment::ConstFloat,
        Segment::ConstString,
    ];

    /// First address of the range
    pub const fn base(self) -> u32 {
        match self {
            Segment::GlobalInt => 1000,
            Segment::GlobalFloat => 2000,
            Segment::GlobalString => 3000,
            Segment::GlobalVoid => 4000,
            Segment::LocalInt => 7000,
            Segment::LocalFloat => 8000,
            Segment::LocalString => 9000,
            Segment::TempInt => 12000,
            Segment::TempFloat => 13000,
            Segment::TempBool => 14000,
            Segment::TempString => 15000,
            Segment::ConstInt => 17000,
            Segment::ConstFloat => 18000,
            Segment::ConstString => 19000,
        }
    }

    /// Last address of the range (inclusive)
    pub const fn limit(self) -> u32 {
        self.base() + SEGMENT_SIZE - 1
    }

    /// Lifetime class of the segment
    pub fn class(self) -> SegmentClass {
        match self {
            Segment::GlobalInt | Segment::GlobalFloat | Segment::GlobalString | Segment::GlobalVoid => {
                SegmentClass::Global
            }
            Segment::LocalInt | Segment::LocalFloat | Segment::LocalString => SegmentClass::Local,
            Segment::TempInt | Segment::TempFloat | Segment::TempBool | Segment::TempString => {
                SegmentClass::Temp
            }
            Segment::ConstInt | Segment::ConstFloat | Segment::ConstString => {
                SegmentClass::Constant
            }
        }
    }

    /// Value type stored in the segment
    pub fn value_type(self) -> ValueType {
        match self {
            Segment::GlobalInt | Segment::LocalInt | Segment::TempInt | Segment::ConstInt => {
                ValueType::Int
            }
            Segment::GlobalFloat | Segment::LocalFloat | Segment::TempFloat | Segment::ConstFloat => {
                ValueType::Float
            }
            Segment::GlobalString
            | Segment::LocalString
            | Segment::TempString
            | Segment::ConstString => ValueType::String,
            Segment::TempBool => ValueType::Bool,
            Segment::GlobalVoid => ValueType::Void,
        }
    }

    /// Segment serving `(class, ty)`, if that combination exists
    pub fn resolve(class: SegmentClass, ty: ValueType) -> Option<Segment> {
        Segment::ALL
            .into_iter()
            .find(|seg| seg.class() == class && seg.value_type() == ty)
    }

    /// Segment containing `address`
    pub fn of(address: Address) -> Option<Segment> {
        Segment::ALL
            .into_iter()
            .find(|seg| (seg.base()..=seg.limit()).contains(&address.0))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.class(), self.value_type())
    }
}

/// Hands out strictly increasing addresses per segment
#[derive(Debug, Clone)]
pub struct Allocator {
    /// Next free offset per segment
    next: [u32; 14],
    /// Highest offset ever handed out per segment (survives rewinds)
    high_water: [u32; 14],
    /// Usable addresses per segment
    capacity: u32,
}

impl Allocator {
    /// Create an allocator using the full segment size
    pub fn new() -> Self {
        Self::with_capacity(SEGMENT_SIZE)
    }

    /// Create an allocator whose segments hold at most `capacity` addresses.
    /// Bases never move; values above [`SEGMENT_SIZE`] are clamped.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            next: [0; 14],
            high_water: [0; 14],
            capacity: capacity.min(SEGMENT_SIZE),
        }
    }

    /// Allocate the next address for `(class, ty)`
    pub fn allocate(&mut self, class: SegmentClass, ty: ValueType) -> Result<Address> {
        let segment = Segment::resolve(class, ty).ok_or_else(|| {
            Error::internal(format!("no {} segment for type '{}'", class, ty))
        })?;
        self.allocate_in(segment)
    }

    /// Allocate the next address in a specific segment
    pub fn allocate_in(&mut self, segment: Segment) -> Result<Address> {
        let slot = segment.index();
        if self.next[slot] >= self.capacity {
            return Err(Error::AllocationOverflow { segment });
        }
        let address = Address(segment.base() + self.next[slot]);
        self.next[slot] += 1;
        self.high_water[slot] = self.high_water[slot].max(self.next[slot]);
        Ok(address)
    }

    /// Reset the local and temp counters to their bases.
    /// Called once at the start of every function body.
    pub fn rewind_local_and_temp(&mut self) {
        for segment in Segment::ALL {
            if matches!(segment.class(), SegmentClass::Local | SegmentClass::Temp) {
                self.next[segment.index()] = 0;
            }
        }
    }

    /// Addresses currently in use in a segment
    pub fn in_use(&self, segment: Segment) -> u32 {
        self.next[segment.index()]
    }

    /// Per-segment high-water marks
    pub fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            counts: Segment::ALL
                .into_iter()
                .map(|seg| (seg, self.high_water[seg.index()]))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

/// High-water mark of every segment that was ever used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// `(segment, addresses used)` in segment order
    pub counts: Vec<(Segment, u32)>,
}

impl MemoryUsage {
    /// Addresses used in one segment
    pub fn count(&self, segment: Segment) -> u32 {
        self.counts
            .iter()
            .find(|(seg, _)| *seg == segment)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_monotonic_per_segment() {
        let mut alloc = Allocator::new();
        assert_eq!(
            alloc.allocate(SegmentClass::Global, ValueType::Int).unwrap(),
            Address(1000)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Global, ValueType::Int).unwrap(),
            Address(1001)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Global, ValueType::Float).unwrap(),
            Address(2000)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Temp, ValueType::Bool).unwrap(),
            Address(14000)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Constant, ValueType::String).unwrap(),
            Address(19000)
        );
    }

    #[test]
    fn test_segments_are_disjoint() {
        for (i, a) in Segment::ALL.iter().enumerate() {
            for b in Segment::ALL.iter().skip(i + 1) {
                assert!(a.limit() < b.base() || b.limit() < a.base(), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn test_segment_of_address() {
        assert_eq!(Segment::of(Address(1999)), Some(Segment::GlobalInt));
        assert_eq!(Segment::of(Address(7000)), Some(Segment::LocalInt));
        assert_eq!(Segment::of(Address(15010)), Some(Segment::TempString));
        assert_eq!(Segment::of(Address(18500)), Some(Segment::ConstFloat));
        assert_eq!(Segment::of(Address(5000)), None);
        assert_eq!(Segment::of(Address::POISON), None);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut alloc = Allocator::with_capacity(2);
        alloc.allocate(SegmentClass::Temp, ValueType::Int).unwrap();
        alloc.allocate(SegmentClass::Temp, ValueType::Int).unwrap();
        let err = alloc
            .allocate(SegmentClass::Temp, ValueType::Int)
            .unwrap_err();
        assert_eq!(
            err,
            Error::AllocationOverflow {
                segment: Segment::TempInt
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rewind_resets_local_and_temp_only() {
        let mut alloc = Allocator::new();
        alloc.allocate(SegmentClass::Global, ValueType::Int).unwrap();
        alloc.allocate(SegmentClass::Local, ValueType::Int).unwrap();
        alloc.allocate(SegmentClass::Local, ValueType::Int).unwrap();
        alloc.allocate(SegmentClass::Temp, ValueType::Float).unwrap();
        assert_eq!(alloc.in_use(Segment::LocalInt), 2);

        alloc.rewind_local_and_temp();
        assert_eq!(alloc.in_use(Segment::LocalInt), 0);
        assert_eq!(alloc.in_use(Segment::TempFloat), 0);
        assert_eq!(alloc.in_use(Segment::GlobalInt), 1);

        assert_eq!(
            alloc.allocate(SegmentClass::Local, ValueType::Int).unwrap(),
            Address(7000)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Temp, ValueType::Float).unwrap(),
            Address(13000)
        );
        assert_eq!(
            alloc.allocate(SegmentClass::Global, ValueType::Int).unwrap(),
            Address(1001)
        );
        // high-water marks survive the rewind
        assert_eq!(alloc.usage().count(Segment::LocalInt), 2);
    }

    #[test]
    fn test_unsupported_combination_is_internal() {
        let mut alloc = Allocator::new();
        let err = alloc
            .allocate(SegmentClass::Local, ValueType::Bool)
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
