//! RSI (Relative Strength Index) indicator

use chrono::{DateTime, Utc};

use crate::data::RingBuffer;
use crate::error::EngineError;
use crate::indicators::{check_price, Indicator, IndicatorValues};

/// Extra closes retained beyond `period + 1`
const HISTORY_BUFFER: usize = 20;

/// Simple-average RSI over the last `period` price changes
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    closes: RingBuffer<f64>,
    update_count: usize,
    last_value: Option<f64>,
    last_update: Option<DateTime<Utc>>,
}

impl Rsi {
    /// Create new RSI indicator
    pub fn new(period: usize) -> Result<Self, EngineError> {
        if period == 0 {
            return Err(EngineError::config("RSI period must be positive"));
        }
        Ok(Self {
            period,
            closes: RingBuffer::new(period + HISTORY_BUFFER),
            update_count: 0,
            last_value: None,
            last_update: None,
        })
    }

    /// Get RSI period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Latest RSI value
    pub fn rsi(&self) -> Option<f64> {
        self.last_value
    }

    /// Time of the last accepted price
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    fn calculate(&self) -> Option<f64> {
        if self.closes.len() < self.period + 1 {
            return None;
        }

        let window: Vec<f64> = self.closes.tail(self.period + 1).copied().collect();
        let (gains, losses) = window.windows(2).fold((0.0, 0.0), |(gains, losses), pair| {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        // A window without losses reads 100, including a perfectly flat one.
        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "RSI"
    }

    fn update(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        check_price(self.name(), price)?;
        self.closes.push(price);
        self.update_count += 1;
        self.last_update = Some(timestamp);
        if let Some(value) = self.calculate() {
            self.last_value = Some(value);
        }
        Ok(())
    }

    fn value(&self) -> (IndicatorValues, bool) {
        let mut values = IndicatorValues::new();
        if let Some(rsi) = self.last_value {
            values.insert("rsi", rsi);
        }
        (values, self.is_ready())
    }

    fn is_ready(&self) -> bool {
        self.last_value.is_some()
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.update_count = 0;
        self.last_value = None;
        self.last_update = None;
    }

    fn data_count(&self) -> usize {
        self.update_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(rsi: &mut Rsi, prices: &[f64]) {
        for &price in prices {
            rsi.update(price, Utc::now()).unwrap();
        }
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let mut rsi = Rsi::new(14).unwrap();
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        feed(&mut rsi, &prices);
        assert!(!rsi.is_ready());
        assert!(rsi.value().0.is_empty());

        rsi.update(120.0, Utc::now()).unwrap();
        assert!(rsi.is_ready());
        assert_eq!(rsi.data_count(), 15);
    }

    #[test]
    fn test_rising_prices_read_100() {
        let mut rsi = Rsi::new(5).unwrap();
        feed(&mut rsi, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(rsi.rsi(), Some(100.0));
    }

    #[test]
    fn test_flat_prices_read_100() {
        let mut rsi = Rsi::new(3).unwrap();
        feed(&mut rsi, &[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(rsi.rsi(), Some(100.0));
    }

    #[test]
    fn test_known_value() {
        // changes: +2, -1, +2, -1 -> gains 4, losses 2 over 4 -> rs = 2
        let mut rsi = Rsi::new(4).unwrap();
        feed(&mut rsi, &[10.0, 12.0, 11.0, 13.0, 12.0]);
        let expected = 100.0 - 100.0 / 3.0;
        assert!((rsi.rsi().unwrap() - expected).abs() < 1e-9);
        assert_eq!(rsi.value().0["rsi"], rsi.rsi().unwrap());
    }

    #[test]
    fn test_uses_only_last_period_changes() {
        let mut rsi = Rsi::new(2).unwrap();
        // an early crash followed by two rises: only the rises are in the window
        feed(&mut rsi, &[100.0, 50.0, 51.0, 52.0]);
        assert_eq!(rsi.rsi(), Some(100.0));
    }

    #[test]
    fn test_bad_price_leaves_state_untouched() {
        let mut rsi = Rsi::new(3).unwrap();
        feed(&mut rsi, &[10.0, 11.0]);
        assert!(rsi.update(0.0, Utc::now()).is_err());
        assert!(rsi.update(-1.0, Utc::now()).is_err());
        assert!(rsi.update(f64::NAN, Utc::now()).is_err());
        assert_eq!(rsi.data_count(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut rsi = Rsi::new(3).unwrap();
        for i in 0..500 {
            rsi.update(100.0 + (i % 7) as f64, Utc::now()).unwrap();
        }
        assert_eq!(rsi.closes.len(), 3 + HISTORY_BUFFER);
        assert_eq!(rsi.data_count(), 500);
    }

    #[test]
    fn test_reset() {
        let mut rsi = Rsi::new(2).unwrap();
        feed(&mut rsi, &[1.0, 2.0, 3.0]);
        assert!(rsi.is_ready());
        rsi.reset();
        assert!(!rsi.is_ready());
        assert_eq!(rsi.data_count(), 0);
    }
}
