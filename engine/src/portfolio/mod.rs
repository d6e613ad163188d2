//! Portfolio management module

pub mod position;
pub mod risk;

pub use position::*;
pub use risk::*;
