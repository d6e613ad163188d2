//! Risk management: position sizing, trailing stops and exit triggers

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{RiskConfig, StopLossRule, TakeProfitRule};
use crate::error::EngineError;
use crate::portfolio::{ExitReason, Position};

/// Sized order with its protective levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    /// min(quantity_by_risk, quantity_by_value)
    pub quantity: f64,
    /// risk_amount / stop distance
    pub quantity_by_risk: f64,
    /// max position value / entry
    pub quantity_by_value: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    /// Portfolio value * risk per trade
    pub risk_amount: f64,
    /// Loss at the stop for the final quantity, as a portfolio percentage
    pub max_loss_percent: f64,
}

impl PositionSizing {
    /// Notional value at entry
    pub fn position_value(&self) -> f64 {
        self.quantity * self.entry_price
    }
}

/// Risk manager
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    /// Create new risk manager
    pub fn new(config: RiskConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Stop-loss for a long entry. The ATR rule needs a current ATR reading.
    pub fn stop_loss_price(&self, entry_price: f64, atr: Option<f64>) -> Result<f64, EngineError> {
        let stop = match self.config.stop_loss {
            StopLossRule::Percent { percent } => entry_price * (1.0 - percent / 100.0),
            StopLossRule::Atr { multiplier } => match atr {
                Some(atr) if atr.is_finite() && atr > 0.0 => entry_price - atr * multiplier,
                Some(atr) => return Err(EngineError::invalid(format!("ATR must be positive, got {}", atr))),
                None => return Err(EngineError::NotReady("ATR not available for stop-loss".to_string())),
            },
        };
        if !(stop > 0.0 && stop < entry_price) {
            return Err(EngineError::invalid(format!(
                "stop-loss {} must be positive and below entry {}",
                stop, entry_price
            )));
        }
        Ok(stop)
    }

    /// Take-profit for a long entry with the given stop
    pub fn take_profit_price(&self, entry_price: f64, stop_loss_price: f64) -> f64 {
        match self.config.take_profit {
            TakeProfitRule::Percent { percent } => entry_price * (1.0 + percent / 100.0),
            TakeProfitRule::RewardRisk { ratio } => entry_price + (entry_price - stop_loss_price) * ratio,
        }
    }

    /// Size a long entry so the loss at the stop is at most `risk_per_trade_percent`
    /// of the portfolio and the notional at most `max_position_percent` of it
    pub fn calculate_position_size(
        &self,
        portfolio_value: f64,
        entry_price: f64,
        atr: Option<f64>,
    ) -> Result<PositionSizing, EngineError> {
        if !(portfolio_value.is_finite() && portfolio_value > 0.0) {
            return Err(EngineError::invalid(format!(
                "portfolio value must be positive, got {}",
                portfolio_value
            )));
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(EngineError::invalid(format!("entry price must be positive, got {}", entry_price)));
        }

        let stop_loss_price = self.stop_loss_price(entry_price, atr)?;
        let take_profit_price = self.take_profit_price(entry_price, stop_loss_price);
        let stop_distance = entry_price - stop_loss_price;

        let risk_amount = portfolio_value * self.config.risk_per_trade_percent / 100.0;
        let max_position_value = portfolio_value * self.config.max_position_percent / 100.0;
        let quantity_by_risk = risk_amount / stop_distance;
        let quantity_by_value = max_position_value / entry_price;
        let quantity = quantity_by_risk.min(quantity_by_value);

        let sizing = PositionSizing {
            quantity,
            quantity_by_risk,
            quantity_by_value,
            entry_price,
            stop_loss_price,
            take_profit_price,
            risk_amount,
            max_loss_percent: quantity * stop_distance / portfolio_value * 100.0,
        };
        debug!(
            "Sized entry at {}: qty {} (risk cap {}, value cap {}), stop {}, target {}",
            entry_price, quantity, quantity_by_risk, quantity_by_value, stop_loss_price, take_profit_price
        );
        Ok(sizing)
    }

    /// Advance the trailing stop for `position` at its current price.
    ///
    /// Arms once the gain reaches `activate_percent`; afterwards the stop follows
    /// the peak at `distance_percent` below it and never moves down. Returns the new
    /// stop when it moved.
    pub fn update_trailing_stop(&self, position: &mut Position) -> Option<f64> {
        let trailing = &self.config.trailing;
        if !trailing.enabled {
            return None;
        }
        if !position.trailing_active {
            if position.gain_percent(position.current_price) < trailing.activate_percent {
                return None;
            }
            position.trailing_active = true;
            info!(
                symbol = %position.symbol,
                price = position.current_price,
                "trailing stop armed"
            );
        }

        let candidate = position.trailing_peak * (1.0 - trailing.distance_percent / 100.0);
        match position.trailing_stop {
            Some(current) if candidate <= current => None,
            _ => {
                position.trailing_stop = Some(candidate);
                debug!(symbol = %position.symbol, stop = candidate, peak = position.trailing_peak, "trailing stop raised");
                Some(candidate)
            }
        }
    }

    /// Mark `position` to `price` and report the first exit condition hit
    pub fn check_exit(&self, position: &mut Position, price: f64) -> Option<ExitReason> {
        position.update_price(price);
        self.update_trailing_stop(position);

        let reason = if position.is_trailing_stop_hit() {
            ExitReason::TrailingStop
        } else if position.is_stop_loss_hit() {
            ExitReason::StopLoss
        } else if position.is_take_profit_hit() {
            ExitReason::TakeProfit
        } else {
            return None;
        };
        info!(symbol = %position.symbol, price, reason = %reason, "exit triggered");
        Some(reason)
    }
}
