//! Indicator and timeframe configuration

use serde::{Deserialize, Serialize};

use crate::config::ensure_positive;
use crate::data::Timeframe;
use crate::error::EngineError;

/// Indicator periods and multipliers, shared by every timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast EMA period
    pub macd_fast: usize,
    /// MACD slow EMA period
    pub macd_slow: usize,
    /// MACD signal EMA period
    pub macd_signal: usize,
    /// Bollinger Bands SMA period
    pub bb_period: usize,
    /// Bollinger Bands standard deviation multiplier
    pub bb_std_dev: f64,
    /// ATR period (stop sizing)
    pub atr_period: usize,
    /// Volume averaging period (liquidity filter)
    pub volume_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            volume_period: 20,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, period) in [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
            ("atr_period", self.atr_period),
            ("volume_period", self.volume_period),
        ] {
            if period == 0 {
                return Err(EngineError::config(format!("{} must be positive", name)));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(EngineError::config(format!(
                "macd_fast ({}) must be less than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        ensure_positive("bb_std_dev", self.bb_std_dev)
    }
}

/// Which timeframes play which role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    /// Timeframe of the incoming candle stream
    pub base: Timeframe,
    /// Entry-confirmation timeframe (phase 4)
    pub entry: Timeframe,
    /// Signal timeframe; the generator runs when it closes (phase 2)
    pub signal: Timeframe,
    /// Trend timeframe (phase 1)
    pub trend: Timeframe,
    /// Raw candles retained per timeframe for charting/diagnostics
    pub history_capacity: usize,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            base: Timeframe::OneMinute,
            entry: Timeframe::FiveMinutes,
            signal: Timeframe::OneHour,
            trend: Timeframe::OneDay,
            history_capacity: 500,
        }
    }
}

impl TimeframeConfig {
    /// Distinct timeframes that need an aggregator, shortest first
    pub fn tracked(&self) -> Vec<Timeframe> {
        let mut tracked = vec![self.entry, self.signal, self.trend];
        tracked.sort();
        tracked.dedup();
        tracked
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (role, tf) in [("entry", self.entry), ("signal", self.signal), ("trend", self.trend)] {
            if tf < self.base {
                return Err(EngineError::config(format!(
                    "{} timeframe {} is shorter than base timeframe {}",
                    role, tf, self.base
                )));
            }
        }
        if self.history_capacity == 0 {
            return Err(EngineError::config("history_capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_fast_must_be_below_slow() {
        let config = IndicatorConfig {
            macd_fast: 26,
            macd_slow: 26,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tracked_timeframes_are_deduplicated() {
        let config = TimeframeConfig {
            entry: Timeframe::OneHour,
            ..Default::default()
        };
        assert_eq!(config.tracked(), vec![Timeframe::OneHour, Timeframe::OneDay]);
    }

    #[test]
    fn test_role_shorter_than_base_rejected() {
        let config = TimeframeConfig {
            base: Timeframe::FiveMinutes,
            entry: Timeframe::OneMinute,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
