//! Little Duck parser module
//!
//! Parses the token stream and reports each completed grammar rule to a
//! [`ReductionSink`] instead of building a syntax tree.

mod duck_parser;
mod reduction;

pub use duck_parser::Parser;
pub use reduction::{Reduction, ReductionSink};
