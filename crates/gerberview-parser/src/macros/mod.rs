//! Macro aperture sub-language: arithmetic expressions and primitives.

pub mod expression;
pub mod primitive;

pub use expression::*;
pub use primitive::*;
