//! Fold base candles into higher-timeframe candles

use chrono::{DateTime, Utc};

use crate::data::{Candle, Timeframe};
use crate::error::EngineError;

/// Builds `target` candles out of a stream of closed `base` candles.
///
/// The aggregate for a period closes as soon as a base candle's close time reaches
/// the period boundary. If the stream skips ahead into a later period, the pending
/// aggregate is closed first with whatever it accumulated.
#[derive(Debug, Clone)]
pub struct TimeframeAggregator {
    symbol: String,
    base: Timeframe,
    target: Timeframe,
    partial: Option<Candle>,
    last_base_open: Option<DateTime<Utc>>,
}

impl TimeframeAggregator {
    pub fn new(symbol: impl Into<String>, base: Timeframe, target: Timeframe) -> Result<Self, EngineError> {
        if target < base {
            return Err(EngineError::config(format!(
                "cannot aggregate {} candles into shorter {} candles",
                base, target
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            base,
            target,
            partial: None,
            last_base_open: None,
        })
    }

    /// Target timeframe
    pub fn target(&self) -> Timeframe {
        self.target
    }

    /// The still-open aggregate, if any
    pub fn partial(&self) -> Option<&Candle> {
        self.partial.as_ref()
    }

    /// Check a base candle without touching state
    pub fn check(&self, candle: &Candle) -> Result<(), EngineError> {
        candle.validate()?;
        if candle.symbol != self.symbol {
            return Err(EngineError::invalid(format!(
                "candle for {} fed to {} aggregator",
                candle.symbol, self.symbol
            )));
        }
        if candle.timeframe != self.base {
            return Err(EngineError::invalid(format!(
                "expected {} base candle, got {}",
                self.base, candle.timeframe
            )));
        }
        if let Some(last) = self.last_base_open {
            if candle.open_time <= last {
                return Err(EngineError::invalid(format!(
                    "{} candle at {} is not after previous candle at {}",
                    self.base, candle.open_time, last
                )));
            }
        }
        Ok(())
    }

    /// Fold one closed base candle. Returns the aggregates that closed, oldest first.
    pub fn push(&mut self, candle: &Candle) -> Result<Vec<Candle>, EngineError> {
        self.check(candle)?;
        self.last_base_open = Some(candle.open_time);

        let mut closed = Vec::new();
        let period_start = self.target.period_start(candle.open_time);

        if let Some(partial) = self.partial.take() {
            if partial.open_time == period_start {
                self.partial = Some(partial);
            } else {
                tracing::debug!(
                    symbol = %self.symbol,
                    timeframe = %self.target,
                    open_time = %partial.open_time,
                    "closing {} candle early after a gap in the base stream",
                    self.target
                );
                closed.push(close(partial));
            }
        }

        match self.partial.as_mut() {
            Some(partial) => {
                partial.high = partial.high.max(candle.high);
                partial.low = partial.low.min(candle.low);
                partial.close = candle.close;
                partial.volume += candle.volume;
            }
            None => {
                let mut partial = Candle::new(
                    self.symbol.clone(),
                    self.target,
                    period_start,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                );
                partial.is_closed = false;
                self.partial = Some(partial);
            }
        }

        if candle.close_time() >= self.target.period_end(candle.open_time) {
            if let Some(partial) = self.partial.take() {
                closed.push(close(partial));
            }
        }
        Ok(closed)
    }

    /// Drop the pending aggregate and ordering state
    pub fn reset(&mut self) {
        self.partial = None;
        self.last_base_open = None;
    }
}

fn close(mut candle: Candle) -> Candle {
    candle.is_closed = true;
    candle
}
