//! Strategy and market filter configuration

use serde::{Deserialize, Serialize};

use crate::config::ensure_positive;
use crate::error::EngineError;

/// Multi-phase confirmation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Signal-timeframe RSI at or below this counts toward a BUY
    pub oversold: f64,
    /// Signal-timeframe RSI at or above this counts toward a SELL
    pub overbought: f64,
    /// Compute the daily trend bias (phase 1)
    pub use_trend_filter: bool,
    /// Reject NEUTRAL bias and require the candidate to agree with the bias
    pub require_trend_confirmation: bool,
    /// Trend RSI above this votes bullish
    pub trend_bullish_rsi: f64,
    /// Trend RSI below this votes bearish
    pub trend_bearish_rsi: f64,
    /// Conditions (out of 3) needed for a signal-timeframe candidate
    pub min_confluence: usize,
    /// BUY price condition: close <= lower band * this
    pub lower_band_tolerance: f64,
    /// SELL price condition: close >= upper band * this
    pub upper_band_tolerance: f64,
    /// Entry-timeframe RSI must be below this to confirm a BUY
    pub entry_max_rsi: f64,
    /// Entry-timeframe RSI must be above this to confirm a SELL
    pub entry_min_rsi: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
            use_trend_filter: true,
            require_trend_confirmation: true,
            trend_bullish_rsi: 60.0,
            trend_bearish_rsi: 40.0,
            min_confluence: 2,
            lower_band_tolerance: 1.01,
            upper_band_tolerance: 0.99,
            entry_max_rsi: 60.0,
            entry_min_rsi: 40.0,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.oversold) || !in_range(self.overbought) || self.oversold >= self.overbought {
            return Err(EngineError::config(format!(
                "oversold ({}) must be below overbought ({}) and both within [0, 100]",
                self.oversold, self.overbought
            )));
        }
        if self.trend_bearish_rsi > self.trend_bullish_rsi {
            return Err(EngineError::config("trend_bearish_rsi must not exceed trend_bullish_rsi"));
        }
        if self.min_confluence == 0 || self.min_confluence > 3 {
            return Err(EngineError::config(format!(
                "min_confluence must be between 1 and 3, got {}",
                self.min_confluence
            )));
        }
        if self.require_trend_confirmation && !self.use_trend_filter {
            return Err(EngineError::config(
                "require_trend_confirmation needs use_trend_filter enabled",
            ));
        }
        ensure_positive("lower_band_tolerance", self.lower_band_tolerance)?;
        ensure_positive("upper_band_tolerance", self.upper_band_tolerance)
    }
}

/// Market condition admission gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFilterConfig {
    /// Minimum band-width percent
    pub min_volatility: f64,
    /// Maximum band-width percent
    pub max_volatility: f64,
    /// Enable the volume check
    pub check_liquidity: bool,
    /// Current volume / average volume must reach this
    pub min_volume_multiplier: f64,
    /// Enable the spread check
    pub check_spread: bool,
    /// Maximum (ask - bid) / mid * 100
    pub max_spread_percent: f64,
}

impl Default for MarketFilterConfig {
    fn default() -> Self {
        Self {
            min_volatility: 1.0,
            max_volatility: 10.0,
            check_liquidity: false,
            min_volume_multiplier: 0.5,
            check_spread: false,
            max_spread_percent: 0.5,
        }
    }
}

impl MarketFilterConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.min_volatility >= 0.0 && self.min_volatility <= self.max_volatility) {
            return Err(EngineError::config(format!(
                "volatility range [{}, {}] is invalid",
                self.min_volatility, self.max_volatility
            )));
        }
        ensure_positive("min_volume_multiplier", self.min_volume_multiplier)?;
        ensure_positive("max_spread_percent", self.max_spread_percent)
    }
}
