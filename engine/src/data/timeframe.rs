//! Candle timeframes

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Candle period supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// All timeframes, shortest first
    pub const ALL: [Timeframe; 4] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::OneHour,
        Timeframe::OneDay,
    ];

    /// Period length in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::OneMinute => 60,
            Timeframe::FiveMinutes => 5 * 60,
            Timeframe::OneHour => 60 * 60,
            Timeframe::OneDay => 24 * 60 * 60,
        }
    }

    /// Period length
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Short label, e.g. "5m"
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Start of the period containing `time` (UTC-aligned)
    pub fn period_start(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let secs = time.timestamp();
        let floored = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(floored, 0).single().unwrap_or(time)
    }

    /// End (exclusive) of the period containing `time`
    pub fn period_end(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        self.period_start(time) + self.duration()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::OneMinute),
            "5m" => Ok(Timeframe::FiveMinutes),
            "1h" | "60m" => Ok(Timeframe::OneHour),
            "1d" | "24h" => Ok(Timeframe::OneDay),
            other => Err(EngineError::config(format!("unsupported timeframe: {}", other))),
        }
    }
}
