//! Lexical analysis for Little Duck
//!
//! Converts source text into a stream of tokens. Illegal characters are
//! reported as accumulated errors rather than aborting the scan.

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};
