//! Strategy module
//!
//! Turns indicator snapshots into BUY/SELL/NONE signals through a multi-phase
//! confirmation algorithm.

pub mod filter;
pub mod generator;
pub mod signal;
pub mod trend;

pub use filter::*;
pub use generator::*;
pub use signal::*;
pub use trend::*;
