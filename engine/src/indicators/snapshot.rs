//! Point-in-time indicator readings for one timeframe

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Timeframe;

/// Indicator readings taken after the latest closed candle of a timeframe.
///
/// Numeric fields are zero until `ready` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timeframe: Timeframe,
    /// Close time of the candle the readings belong to
    pub timestamp: Option<DateTime<Utc>>,
    /// Close price of that candle
    pub price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub band_width_percent: f64,
    pub percent_b: f64,
    pub atr: Option<f64>,
    /// Volume of that candle
    pub volume: f64,
    pub average_volume: Option<f64>,
    /// RSI, MACD and bands all have enough data
    pub ready: bool,
}

impl IndicatorSnapshot {
    /// Snapshot with no readings
    pub fn empty(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            timestamp: None,
            price: 0.0,
            rsi: 0.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            bb_upper: 0.0,
            bb_middle: 0.0,
            bb_lower: 0.0,
            band_width_percent: 0.0,
            percent_b: 0.0,
            atr: None,
            volume: 0.0,
            average_volume: None,
            ready: false,
        }
    }

    /// Histogram positive and MACD above its signal line
    pub fn macd_bullish(&self) -> bool {
        self.macd_histogram > 0.0 && self.macd > self.macd_signal
    }

    /// Histogram negative and MACD below its signal line
    pub fn macd_bearish(&self) -> bool {
        self.macd_histogram < 0.0 && self.macd < self.macd_signal
    }

    /// Current volume over the average volume
    pub fn volume_ratio(&self) -> Option<f64> {
        self.average_volume
            .filter(|avg| *avg > 0.0)
            .map(|avg| self.volume / avg)
    }
}
