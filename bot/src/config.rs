//! Runner settings from the environment (`.env` honoured)

use anyhow::{Context, Result};
use dotenv::dotenv;
use engine::config::EngineConfig;
use std::str::FromStr;

pub struct Config {
    pub symbol: String,
    pub portfolio_value: f64,
    pub risk_per_trade_percent: Option<f64>,
    pub require_trend_confirmation: Option<bool>,
    /// Optional JSON file with a full or partial `EngineConfig`
    pub engine_config_path: Option<String>,
    /// Paper fills are this much worse than the reference price
    pub slippage_percent: f64,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Config {
            symbol: var("SYMBOL").unwrap_or_else(|| "BTC/USDT".to_string()),
            portfolio_value: parse(&var, "PORTFOLIO_VALUE")?.unwrap_or(10_000.0),
            risk_per_trade_percent: parse(&var, "RISK_PER_TRADE_PERCENT")?,
            require_trend_confirmation: parse(&var, "REQUIRE_TREND_CONFIRMATION")?,
            engine_config_path: var("ENGINE_CONFIG"),
            slippage_percent: parse(&var, "PAPER_SLIPPAGE_PERCENT")?.unwrap_or(0.0),
            log_json: parse(&var, "LOG_JSON")?.unwrap_or(false),
        })
    }

    /// Defaults, then the optional JSON file, then environment overrides
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.engine_config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read engine config {}", path))?;
                serde_json::from_str(&raw).with_context(|| format!("Failed to parse engine config {}", path))?
            }
            None => EngineConfig::default(),
        };
        if let Some(risk) = self.risk_per_trade_percent {
            config.risk.risk_per_trade_percent = risk;
        }
        if let Some(required) = self.require_trend_confirmation {
            config.strategy.require_trend_confirmation = required;
            if required {
                config.strategy.use_trend_filter = true;
            }
        }
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("{} has invalid value {:?}", key, raw)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(lookup(&[])).unwrap();
        assert_eq!(config.symbol, "BTC/USDT");
        assert_eq!(config.portfolio_value, 10_000.0);
        assert!(config.risk_per_trade_percent.is_none());
        config.engine_config().unwrap();
    }

    #[test]
    fn test_overrides_applied() {
        let config = Config::from_vars(lookup(&[
            ("SYMBOL", "ETH/USDT"),
            ("PORTFOLIO_VALUE", "2500"),
            ("RISK_PER_TRADE_PERCENT", "1.5"),
            ("REQUIRE_TREND_CONFIRMATION", "false"),
        ]))
        .unwrap();
        let engine = config.engine_config().unwrap();
        assert_eq!(config.symbol, "ETH/USDT");
        assert_eq!(config.portfolio_value, 2_500.0);
        assert_eq!(engine.risk.risk_per_trade_percent, 1.5);
        assert!(!engine.strategy.require_trend_confirmation);
    }

    #[test]
    fn test_bad_number_names_the_variable() {
        let err = Config::from_vars(lookup(&[("PORTFOLIO_VALUE", "lots")])).err().unwrap();
        assert!(err.to_string().contains("PORTFOLIO_VALUE"));
    }

    #[test]
    fn test_out_of_range_risk_rejected() {
        let config = Config::from_vars(lookup(&[("RISK_PER_TRADE_PERCENT", "150")])).unwrap();
        assert!(config.engine_config().is_err());
    }
}
