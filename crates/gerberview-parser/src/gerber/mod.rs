//! RS-274X (Gerber) block grammar.

pub mod parser;

pub use parser::parse_block;
