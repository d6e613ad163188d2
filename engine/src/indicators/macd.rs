//! MACD (Moving Average Convergence Divergence) indicator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::RingBuffer;
use crate::error::EngineError;
use crate::indicators::{check_price, simple_average, Ema, Indicator, IndicatorValues};

/// MACD output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD with SMA-seeded EMAs.
///
/// Both price EMAs are seeded with SMAs once `slow` prices have arrived; each later
/// price yields one MACD value. The signal EMA is seeded with the SMA of the first
/// `signal` MACD values, so the first output appears after `slow + signal` prices.
#[derive(Debug, Clone)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    seed_prices: RingBuffer<f64>,
    seed_macd: RingBuffer<f64>,
    fast: Ema,
    slow: Ema,
    signal: Ema,
    update_count: usize,
    last_output: Option<MacdOutput>,
}

impl Macd {
    /// Create new MACD indicator
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Result<Self, EngineError> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            return Err(EngineError::config("MACD periods must be positive"));
        }
        if fast_period >= slow_period {
            return Err(EngineError::config(format!(
                "MACD fast period ({}) must be less than slow period ({})",
                fast_period, slow_period
            )));
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
            seed_prices: RingBuffer::new(slow_period),
            seed_macd: RingBuffer::new(signal_period),
            fast: Ema::new(fast_period),
            slow: Ema::new(slow_period),
            signal: Ema::new(signal_period),
            update_count: 0,
            last_output: None,
        })
    }

    /// Get MACD line value
    pub fn macd(&self) -> Option<f64> {
        self.last_output.map(|o| o.macd)
    }

    /// Get signal line value
    pub fn signal(&self) -> Option<f64> {
        self.last_output.map(|o| o.signal)
    }

    /// Get histogram value (MACD - Signal)
    pub fn histogram(&self) -> Option<f64> {
        self.last_output.map(|o| o.histogram)
    }

    /// Latest full output
    pub fn output(&self) -> Option<MacdOutput> {
        self.last_output
    }

    /// Prices required before the first output
    pub fn warmup(&self) -> usize {
        self.slow_period + self.signal_period
    }

    fn seed_price_emas(&mut self) {
        let slow_seed = simple_average(self.seed_prices.iter());
        let fast_seed = simple_average(self.seed_prices.tail(self.fast_period));
        if let (Some(fast), Some(slow)) = (fast_seed, slow_seed) {
            self.fast.seed(fast);
            self.slow.seed(slow);
        }
        self.seed_prices.clear();
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "MACD"
    }

    fn update(&mut self, price: f64, _timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        check_price(self.name(), price)?;
        self.update_count += 1;

        if !self.slow.is_seeded() {
            self.seed_prices.push(price);
            if self.seed_prices.len() == self.slow_period {
                self.seed_price_emas();
            }
            return Ok(());
        }

        let macd = self.fast.next(price) - self.slow.next(price);

        let signal = if self.signal.is_seeded() {
            self.signal.next(macd)
        } else {
            self.seed_macd.push(macd);
            if self.seed_macd.len() < self.signal_period {
                return Ok(());
            }
            let seed = simple_average(self.seed_macd.iter()).unwrap_or(macd);
            self.signal.seed(seed);
            self.seed_macd.clear();
            seed
        };

        self.last_output = Some(MacdOutput {
            macd,
            signal,
            histogram: macd - signal,
        });
        Ok(())
    }

    fn value(&self) -> (IndicatorValues, bool) {
        let mut values = IndicatorValues::new();
        if let Some(output) = self.last_output {
            values.insert("macd", output.macd);
            values.insert("signal", output.signal);
            values.insert("histogram", output.histogram);
        }
        (values, self.is_ready())
    }

    fn is_ready(&self) -> bool {
        self.last_output.is_some()
    }

    fn reset(&mut self) {
        self.seed_prices.clear();
        self.seed_macd.clear();
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
        self.update_count = 0;
        self.last_output = None;
    }

    fn data_count(&self) -> usize {
        self.update_count
    }
}
