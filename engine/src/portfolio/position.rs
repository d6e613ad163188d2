//! Position tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::EngineError;

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    /// SELL from the signal generator
    Signal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TakeProfit => "take-profit",
            ExitReason::TrailingStop => "trailing stop",
            ExitReason::Signal => "sell signal",
        })
    }
}

/// Open long position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position ID
    pub id: String,
    /// Symbol (e.g., "BTC/USDT")
    pub symbol: String,
    pub quantity: f64,
    /// Fill price of the entry order
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Last marked price
    pub current_price: f64,
    /// Always strictly below entry price
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    /// Trailing stop armed
    pub trailing_active: bool,
    /// Highest price seen since entry
    pub trailing_peak: f64,
    /// Current trailing stop level, once armed
    pub trailing_stop: Option<f64>,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
}

impl Position {
    /// Create new position
    pub fn new(
        symbol: impl Into<String>,
        quantity: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        stop_loss_price: f64,
        take_profit_price: f64,
    ) -> Result<Self, EngineError> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(EngineError::invalid(format!("position quantity must be positive, got {}", quantity)));
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(EngineError::invalid(format!("entry price must be positive, got {}", entry_price)));
        }
        if !(stop_loss_price > 0.0 && stop_loss_price < entry_price) {
            return Err(EngineError::invalid(format!(
                "stop-loss {} must be positive and below entry {}",
                stop_loss_price, entry_price
            )));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            quantity,
            entry_price,
            entry_time,
            current_price: entry_price,
            stop_loss_price,
            take_profit_price,
            trailing_active: false,
            trailing_peak: entry_price,
            trailing_stop: None,
            unrealized_pnl: 0.0,
            unrealized_pnl_percent: 0.0,
        })
    }

    /// Mark to `price` and track the peak
    pub fn update_price(&mut self, price: f64) {
        self.current_price = price;
        self.trailing_peak = self.trailing_peak.max(price);
        self.unrealized_pnl = (price - self.entry_price) * self.quantity;
        self.unrealized_pnl_percent = self.gain_percent(price);
    }

    /// Gain of `price` over entry, in percent
    pub fn gain_percent(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Tightest active stop: the trailing stop once armed, else the stop-loss
    pub fn effective_stop(&self) -> f64 {
        self.trailing_stop
            .map_or(self.stop_loss_price, |trail| trail.max(self.stop_loss_price))
    }

    /// Check if stop loss is hit
    pub fn is_stop_loss_hit(&self) -> bool {
        self.current_price <= self.stop_loss_price
    }

    /// Check if take profit is hit
    pub fn is_take_profit_hit(&self) -> bool {
        self.current_price >= self.take_profit_price
    }

    /// Check if the armed trailing stop is breached
    pub fn is_trailing_stop_hit(&self) -> bool {
        self.trailing_stop.map_or(false, |stop| self.current_price <= stop)
    }

    /// Get position value
    pub fn value(&self) -> f64 {
        self.current_price * self.quantity
    }

    /// Get entry value
    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Realized P&L of selling the whole position at `exit_price`
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        (exit_price - self.entry_price) * self.quantity
    }
}

/// A position after its exit was filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub reason: ExitReason,
    pub realized_pnl: f64,
}

impl ClosedPosition {
    pub fn new(position: Position, exit_price: f64, exit_time: DateTime<Utc>, reason: ExitReason) -> Self {
        let realized_pnl = position.pnl_at(exit_price);
        Self {
            position,
            exit_price,
            exit_time,
            reason,
            realized_pnl,
        }
    }

    /// Time held
    pub fn duration(&self) -> chrono::Duration {
        self.exit_time - self.position.entry_time
    }
}
