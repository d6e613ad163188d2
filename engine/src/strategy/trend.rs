//! Trend bias from the trend-timeframe snapshot

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StrategyConfig;
use crate::indicators::IndicatorSnapshot;

/// Direction of the higher-timeframe trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for TrendBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendBias::Bullish => "BULLISH",
            TrendBias::Bearish => "BEARISH",
            TrendBias::Neutral => "NEUTRAL",
        })
    }
}

/// Result of the three-vote trend scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendVotes {
    pub bullish: u8,
    pub bearish: u8,
}

impl TrendVotes {
    /// Votes: RSI against the bullish/bearish thresholds, MACD histogram sign and
    /// price against the middle band
    pub fn count(snapshot: &IndicatorSnapshot, config: &StrategyConfig) -> Self {
        let mut votes = Self { bullish: 0, bearish: 0 };
        let mut cast = |bullish: bool, bearish: bool| {
            votes.bullish += u8::from(bullish);
            votes.bearish += u8::from(bearish);
        };
        cast(snapshot.rsi > config.trend_bullish_rsi, snapshot.rsi < config.trend_bearish_rsi);
        cast(snapshot.macd_histogram > 0.0, snapshot.macd_histogram < 0.0);
        cast(snapshot.price > snapshot.bb_middle, snapshot.price < snapshot.bb_middle);
        votes
    }

    /// Majority (two of three) decides; anything else is neutral
    pub fn bias(&self) -> TrendBias {
        if self.bullish >= 2 {
            TrendBias::Bullish
        } else if self.bearish >= 2 {
            TrendBias::Bearish
        } else {
            TrendBias::Neutral
        }
    }
}

impl fmt::Display for TrendVotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bullish / {} bearish votes", self.bullish, self.bearish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Timeframe;

    fn daily(rsi: f64, histogram: f64, price: f64, middle: f64) -> IndicatorSnapshot {
        let mut snap = IndicatorSnapshot::empty(Timeframe::OneDay);
        snap.rsi = rsi;
        snap.macd_histogram = histogram;
        snap.price = price;
        snap.bb_middle = middle;
        snap.ready = true;
        snap
    }

    #[test]
    fn test_majority_votes() {
        let config = StrategyConfig::default();
        assert_eq!(TrendVotes::count(&daily(65.0, 1.0, 110.0, 100.0), &config).bias(), TrendBias::Bullish);
        assert_eq!(TrendVotes::count(&daily(50.0, 1.0, 110.0, 100.0), &config).bias(), TrendBias::Bullish);
        assert_eq!(TrendVotes::count(&daily(35.0, -1.0, 110.0, 100.0), &config).bias(), TrendBias::Bearish);
        assert_eq!(TrendVotes::count(&daily(50.0, -1.0, 110.0, 100.0), &config).bias(), TrendBias::Neutral);
    }

    #[test]
    fn test_flat_indicators_are_neutral() {
        let votes = TrendVotes::count(&daily(50.0, 0.0, 100.0, 100.0), &StrategyConfig::default());
        assert_eq!(votes, TrendVotes { bullish: 0, bearish: 0 });
        assert_eq!(votes.bias(), TrendBias::Neutral);
    }
}
