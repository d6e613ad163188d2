//! Risk management configuration

use serde::{Deserialize, Serialize};

use crate::config::{ensure_percent, ensure_positive};
use crate::error::EngineError;

/// How the stop-loss is placed below entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StopLossRule {
    /// entry * (1 - percent / 100)
    Percent { percent: f64 },
    /// entry - ATR * multiplier
    Atr { multiplier: f64 },
}

/// How the take-profit is placed above entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TakeProfitRule {
    /// entry * (1 + percent / 100)
    Percent { percent: f64 },
    /// entry + (entry - stop) * ratio
    RewardRisk { ratio: f64 },
}

/// Trailing stop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    /// Unrealized gain (percent) that arms the trailing stop
    pub activate_percent: f64,
    /// Distance below the peak (percent) the stop trails at
    pub distance_percent: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activate_percent: 2.0,
            distance_percent: 1.0,
        }
    }
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Portfolio percentage risked per trade (e.g., 2.0 = 2%)
    pub risk_per_trade_percent: f64,
    /// Maximum position value as a portfolio percentage (e.g., 10.0 = 10%)
    pub max_position_percent: f64,
    pub stop_loss: StopLossRule,
    pub take_profit: TakeProfitRule,
    pub trailing: TrailingConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_percent: 2.0,
            max_position_percent: 10.0,
            stop_loss: StopLossRule::Percent { percent: 3.0 },
            take_profit: TakeProfitRule::RewardRisk { ratio: 2.0 },
            trailing: TrailingConfig::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        ensure_percent("risk_per_trade_percent", self.risk_per_trade_percent)?;
        ensure_percent("max_position_percent", self.max_position_percent)?;
        match self.stop_loss {
            StopLossRule::Percent { percent } => {
                if !(percent.is_finite() && percent > 0.0 && percent < 100.0) {
                    return Err(EngineError::config(format!(
                        "stop-loss percent must be in (0, 100), got {}",
                        percent
                    )));
                }
            }
            StopLossRule::Atr { multiplier } => ensure_positive("stop-loss ATR multiplier", multiplier)?,
        }
        match self.take_profit {
            TakeProfitRule::Percent { percent } => ensure_positive("take-profit percent", percent)?,
            TakeProfitRule::RewardRisk { ratio } => ensure_positive("reward:risk ratio", ratio)?,
        }
        if self.trailing.enabled {
            ensure_positive("trailing activate_percent", self.trailing.activate_percent)?;
            if !(self.trailing.distance_percent > 0.0 && self.trailing.distance_percent < 100.0) {
                return Err(EngineError::config(format!(
                    "trailing distance_percent must be in (0, 100), got {}",
                    self.trailing.distance_percent
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_serde_tags() {
        let rule: StopLossRule = serde_json::from_str(r#"{"mode":"atr","multiplier":1.5}"#).unwrap();
        assert_eq!(rule, StopLossRule::Atr { multiplier: 1.5 });
        let rule: TakeProfitRule =
            serde_json::from_str(r#"{"mode":"reward_risk","ratio":3.0}"#).unwrap();
        assert_eq!(rule, TakeProfitRule::RewardRisk { ratio: 3.0 });
    }

    #[test]
    fn test_invalid_stop_percent() {
        let config = RiskConfig {
            stop_loss: StopLossRule::Percent { percent: 100.0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
