//! NC drill (Excellon) block grammar.

pub mod parser;
pub mod types;

pub use parser::parse_block;
pub use types::FormatHint;
