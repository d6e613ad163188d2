//! Bollinger Bands indicator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ta::indicators::BollingerBands as TaBollingerBands;
use ta::{Next, Reset};

use crate::error::EngineError;
use crate::indicators::{check_price, Indicator, IndicatorValues};

/// Bollinger Bands output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandsOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub std_dev: f64,
    /// (upper - lower) / middle * 100
    pub band_width_percent: f64,
    /// (price - lower) / (upper - lower); 0.5 when the bands collapse
    pub percent_b: f64,
}

/// SMA +/- population standard deviation bands
#[derive(Debug, Clone)]
pub struct BollingerBands {
    inner: TaBollingerBands,
    period: usize,
    multiplier: f64,
    update_count: usize,
    last_output: Option<BandsOutput>,
}

impl BollingerBands {
    /// Create new Bollinger Bands indicator
    pub fn new(period: usize, multiplier: f64) -> Result<Self, EngineError> {
        if period == 0 {
            return Err(EngineError::config("Bollinger period must be positive"));
        }
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(EngineError::config(format!(
                "Bollinger std-dev multiplier must be positive, got {}",
                multiplier
            )));
        }
        let inner = TaBollingerBands::new(period, multiplier)
            .map_err(|e| EngineError::config(format!("Failed to create Bollinger Bands: {}", e)))?;
        Ok(Self {
            inner,
            period,
            multiplier,
            update_count: 0,
            last_output: None,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Get upper band
    pub fn upper(&self) -> Option<f64> {
        self.last_output.map(|o| o.upper)
    }

    /// Get middle band (SMA)
    pub fn middle(&self) -> Option<f64> {
        self.last_output.map(|o| o.middle)
    }

    /// Get lower band
    pub fn lower(&self) -> Option<f64> {
        self.last_output.map(|o| o.lower)
    }

    /// Latest full output
    pub fn output(&self) -> Option<BandsOutput> {
        self.last_output
    }

    /// %B of an arbitrary price against the current bands
    pub fn percent_b(&self, price: f64) -> Option<f64> {
        self.last_output.map(|o| percent_b(price, o.lower, o.upper))
    }
}

fn percent_b(price: f64, lower: f64, upper: f64) -> f64 {
    let width = upper - lower;
    if width > 0.0 {
        (price - lower) / width
    } else {
        0.5
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "BollingerBands"
    }

    fn update(&mut self, price: f64, _timestamp: DateTime<Utc>) -> Result<(), EngineError> {
        check_price(self.name(), price)?;
        let bands = self.inner.next(price);
        self.update_count += 1;
        // ta reports bands over a partial window; only a full window counts
        if self.update_count >= self.period {
            let std_dev = (bands.upper - bands.average) / self.multiplier;
            self.last_output = Some(BandsOutput {
                upper: bands.upper,
                middle: bands.average,
                lower: bands.lower,
                std_dev,
                band_width_percent: (bands.upper - bands.lower) / bands.average * 100.0,
                percent_b: percent_b(price, bands.lower, bands.upper),
            });
        }
        Ok(())
    }

    fn value(&self) -> (IndicatorValues, bool) {
        let mut values = IndicatorValues::new();
        if let Some(o) = self.last_output {
            values.insert("upper", o.upper);
            values.insert("middle", o.middle);
            values.insert("lower", o.lower);
            values.insert("band_width_percent", o.band_width_percent);
            values.insert("percent_b", o.percent_b);
        }
        (values, self.is_ready())
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.update_count = 0;
        self.last_output = None;
    }

    fn data_count(&self) -> usize {
        self.update_count
    }
}
