//! Technical indicators module
//!
//! Streaming calculators that are fed one closing price at a time. Every
//! calculator implements [`Indicator`]; [`IndicatorSet`] bundles the ones a
//! timeframe needs and produces an [`IndicatorSnapshot`].

pub mod bb;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod set;
pub mod snapshot;

pub use bb::*;
pub use ema::*;
pub use macd::*;
pub use rsi::*;
pub use set::*;
pub use snapshot::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

/// Named outputs of an indicator, e.g. `{"rsi": 42.0}`
pub type IndicatorValues = BTreeMap<&'static str, f64>;

/// Capability contract shared by all streaming indicators
pub trait Indicator: Send + std::fmt::Debug {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Feed a new closing price. Fails without touching state if `price` is not a
    /// positive finite number.
    fn update(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<(), EngineError>;

    /// Current outputs and whether they are meaningful yet
    fn value(&self) -> (IndicatorValues, bool);

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;

    /// Drop all accumulated state
    fn reset(&mut self);

    /// Number of prices accepted since construction or the last reset
    fn data_count(&self) -> usize;
}

/// Indicator type tag with parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    BollingerBands { period: usize, std_dev: f64 },
}

impl IndicatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Rsi { .. } => "RSI",
            IndicatorKind::Macd { .. } => "MACD",
            IndicatorKind::BollingerBands { .. } => "BollingerBands",
        }
    }
}

/// Build the concrete indicator for `kind`, validating its parameters
pub fn create_indicator(kind: IndicatorKind) -> Result<Box<dyn Indicator>, EngineError> {
    Ok(match kind {
        IndicatorKind::Rsi { period } => Box::new(Rsi::new(period)?),
        IndicatorKind::Macd { fast, slow, signal } => Box::new(Macd::new(fast, slow, signal)?),
        IndicatorKind::BollingerBands { period, std_dev } => {
            Box::new(BollingerBands::new(period, std_dev)?)
        }
    })
}

/// Reject non-positive or non-finite prices
pub(crate) fn check_price(indicator: &str, price: f64) -> Result<(), EngineError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(format!(
            "{} received non-positive price {}",
            indicator, price
        )))
    }
}
