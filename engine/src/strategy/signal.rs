//! Trading signals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::IndicatorSnapshot;
use crate::strategy::TrendBias;

/// Signal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    /// Open a long position
    Buy,
    /// Close the open position
    Sell,
    /// No action
    None,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
            SignalKind::None => "NONE",
        })
    }
}

/// Confirmation step that produced or rejected a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPhase {
    /// Signal-timeframe indicators not ready
    Data,
    TrendBias,
    Confluence,
    Alignment,
    Position,
    EntryConfirmation,
    MarketFilter,
}

impl SignalPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SignalPhase::Data => "insufficient data",
            SignalPhase::TrendBias => "trend bias",
            SignalPhase::Confluence => "confluence",
            SignalPhase::Alignment => "trend alignment",
            SignalPhase::Position => "position state",
            SignalPhase::EntryConfirmation => "entry confirmation",
            SignalPhase::MarketFilter => "market filter",
        }
    }
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one signal evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Human-readable explanation; for NONE it names the failing phase
    pub reason: String,
    /// Phase that rejected the candidate, if any
    pub rejected_at: Option<SignalPhase>,
    /// Signal-timeframe close price at evaluation
    pub price: f64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Trend bias used for the decision, when computed
    pub trend_bias: Option<TrendBias>,
    /// Snapshots that contributed to the decision
    pub snapshots: Vec<IndicatorSnapshot>,
}

impl Signal {
    /// Create an actionable signal
    pub fn new(kind: SignalKind, reason: impl Into<String>, snapshots: Vec<IndicatorSnapshot>) -> Self {
        let (price, timestamp) = snapshots
            .first()
            .map(|s| (s.price, s.timestamp))
            .unwrap_or((0.0, None));
        Self {
            kind,
            reason: reason.into(),
            rejected_at: None,
            price,
            timestamp,
            trend_bias: None,
            snapshots,
        }
    }

    /// Create a NONE signal rejected at `phase`
    pub fn rejected(phase: SignalPhase, detail: impl fmt::Display, snapshots: Vec<IndicatorSnapshot>) -> Self {
        let mut signal = Self::new(SignalKind::None, format!("{}: {}", phase, detail), snapshots);
        signal.rejected_at = Some(phase);
        signal
    }

    /// Attach the trend bias
    pub fn with_trend_bias(mut self, bias: Option<TrendBias>) -> Self {
        self.trend_bias = bias;
        self
    }

    /// BUY or SELL
    pub fn is_actionable(&self) -> bool {
        self.kind != SignalKind::None
    }
}
