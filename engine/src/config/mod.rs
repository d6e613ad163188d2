//! Configuration module
//!
//! Every tunable of the engine, with documented defaults. The engine only consumes
//! these structs; loading them from files or the environment is the caller's job.

pub mod indicator;
pub mod risk;
pub mod safety;
pub mod strategy;

pub use indicator::*;
pub use risk::*;
pub use safety::*;
pub use strategy::*;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub timeframes: TimeframeConfig,
    pub strategy: StrategyConfig,
    pub market_filter: MarketFilterConfig,
    pub risk: RiskConfig,
    pub safety: SafetyConfig,
}

impl EngineConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), EngineError> {
        self.indicators.validate()?;
        self.timeframes.validate()?;
        self.strategy.validate()?;
        self.market_filter.validate()?;
        self.risk.validate()?;
        self.safety.validate()?;
        Ok(())
    }
}

/// Fail with a configuration error unless `value` is finite and > 0
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!("{} must be positive, got {}", name, value)))
    }
}

/// Fail with a configuration error unless `value` is finite and in (0, 100]
pub(crate) fn ensure_percent(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!(
            "{} must be in (0, 100], got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"strategy": {"oversold": 25.0}}"#).unwrap();
        assert_eq!(config.strategy.oversold, 25.0);
        assert_eq!(config.strategy.overbought, 70.0);
        assert_eq!(config.indicators.rsi_period, 14);
        config.validate().unwrap();
    }
}
