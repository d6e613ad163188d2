//! Market condition admission gate

use serde::{Deserialize, Serialize};

use crate::config::MarketFilterConfig;
use crate::data::MarketQuote;
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;

/// Measured market conditions and every check that failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAssessment {
    /// Band-width percent of the signal timeframe
    pub volatility: f64,
    pub volume_ratio: Option<f64>,
    pub spread_percent: Option<f64>,
    pub failures: Vec<String>,
}

impl MarketAssessment {
    pub fn is_tradeable(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failing checks joined into one reason
    pub fn reason(&self) -> String {
        if self.failures.is_empty() {
            format!("volatility {:.2}% within range", self.volatility)
        } else {
            self.failures.join("; ")
        }
    }
}

/// Volatility, liquidity and spread checks
#[derive(Debug, Clone)]
pub struct MarketConditionFilter {
    config: MarketFilterConfig,
}

impl MarketConditionFilter {
    pub fn new(config: MarketFilterConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MarketFilterConfig {
        &self.config
    }

    /// Evaluate all configured checks against the signal-timeframe snapshot.
    ///
    /// The spread check needs a quote; without one it is skipped.
    pub fn assess(&self, snapshot: &IndicatorSnapshot, quote: Option<MarketQuote>) -> MarketAssessment {
        let cfg = &self.config;
        let mut failures = Vec::new();

        let volatility = snapshot.band_width_percent;
        if volatility < cfg.min_volatility {
            failures.push(format!(
                "volatility {:.2}% below minimum {:.2}%",
                volatility, cfg.min_volatility
            ));
        } else if volatility > cfg.max_volatility {
            failures.push(format!(
                "volatility {:.2}% above maximum {:.2}%",
                volatility, cfg.max_volatility
            ));
        }

        let volume_ratio = snapshot.volume_ratio();
        if cfg.check_liquidity {
            match volume_ratio {
                Some(ratio) if ratio < cfg.min_volume_multiplier => failures.push(format!(
                    "volume {:.2}x average below minimum {:.2}x",
                    ratio, cfg.min_volume_multiplier
                )),
                Some(_) => {}
                None => failures.push("volume average not available".to_string()),
            }
        }

        let spread_percent = quote.map(|q| q.spread_percent());
        if cfg.check_spread {
            match spread_percent {
                Some(spread) if spread > cfg.max_spread_percent => failures.push(format!(
                    "spread {:.3}% above maximum {:.3}%",
                    spread, cfg.max_spread_percent
                )),
                Some(_) => {}
                None => tracing::debug!("no market quote available, spread check skipped"),
            }
        }

        MarketAssessment {
            volatility,
            volume_ratio,
            spread_percent,
            failures,
        }
    }
}
