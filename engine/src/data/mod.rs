//! Market data module
//!
//! Candle, timeframe and order book types, plus the bounded ring buffer used for
//! every rolling window in the engine.

pub mod candle;
pub mod order;
pub mod ring;
pub mod timeframe;

pub use candle::*;
pub use order::*;
pub use ring::*;
pub use timeframe::*;
