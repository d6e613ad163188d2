//! OHLCV candle data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Timeframe;
use crate::error::EngineError;

/// OHLCV candle data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Symbol (e.g., "BTC/USDT")
    pub symbol: String,
    /// Timeframe of the bar
    pub timeframe: Timeframe,
    /// Period open time
    pub open_time: DateTime<Utc>,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Volume
    pub volume: f64,
    /// Whether the period has ended; closed candles are never mutated
    pub is_closed: bool,
}

impl Candle {
    /// Create a new closed candle
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            open_time,
            open,
            high,
            low,
            close,
            volume,
            is_closed: true,
        }
    }

    /// Check the bar is usable: positive finite prices, consistent extrema,
    /// non-negative volume
    pub fn validate(&self) -> Result<(), EngineError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(EngineError::invalid(format!(
                "{} {} candle at {} has non-positive price (o={} h={} l={} c={})",
                self.symbol, self.timeframe, self.open_time, self.open, self.high, self.low, self.close
            )));
        }
        if self.high < self.low {
            return Err(EngineError::invalid(format!(
                "{} {} candle at {} has high {} below low {}",
                self.symbol, self.timeframe, self.open_time, self.high, self.low
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(EngineError::invalid(format!(
                "{} {} candle at {} has invalid volume {}",
                self.symbol, self.timeframe, self.open_time, self.volume
            )));
        }
        Ok(())
    }

    /// Period close time (open time + timeframe length)
    pub fn close_time(&self) -> DateTime<Utc> {
        self.open_time + self.timeframe.duration()
    }

    /// Get typical price (HLC/3)
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Check if candle is bullish
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if candle is bearish
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get total range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}
