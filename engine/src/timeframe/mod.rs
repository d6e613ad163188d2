//! Multi-timeframe candle aggregation
//!
//! A base candle stream (1m by default) is folded into the entry, signal and trend
//! timeframes. Each closed aggregate feeds that timeframe's indicator set.

pub mod aggregator;
pub mod manager;

pub use aggregator::*;
pub use manager::*;
