//! Safety layer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ensure_percent, ensure_positive};
use crate::error::EngineError;

/// Circuit breaker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub max_failures: u32,
    /// Time since the last failure before a trial call is allowed
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Fixed-window rate limit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed per window
    pub max_calls: u32,
    /// Window length
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 10,
            interval_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Order book admission limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    pub enabled: bool,
    /// Minimum number of levels on each side
    pub min_depth_levels: usize,
    /// Maximum (ask - bid) / mid * 100
    pub max_spread_percent: f64,
    /// Minimum total quantity on the side the order consumes
    pub min_opposite_volume: f64,
    /// Order quantity may not exceed this fraction of the opposite-side volume
    pub min_volume_multiplier: f64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_depth_levels: 5,
            max_spread_percent: 0.5,
            min_opposite_volume: 0.0,
            min_volume_multiplier: 0.1,
        }
    }
}

/// Exposure limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionLimitConfig {
    /// Absolute cap on position notional
    pub max_position_value: f64,
    /// Cap on position notional as a portfolio percentage
    pub max_position_percent: f64,
    /// Realized loss per day after which new positions are refused
    pub max_daily_loss: f64,
    /// Concurrently open positions
    pub max_open_positions: usize,
}

impl Default for PositionLimitConfig {
    fn default() -> Self {
        Self {
            max_position_value: 10_000.0,
            max_position_percent: 20.0,
            max_daily_loss: 500.0,
            max_open_positions: 3,
        }
    }
}

/// Backoff shape between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// No delay
    Immediate,
    /// base * attempt
    Linear,
    /// base * 2^attempt
    Exponential,
}

/// Retry policy for the execution closure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: RetryStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            strategy: RetryStrategy::Exponential,
        }
    }
}

/// Safety layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub liquidity: LiquidityConfig,
    pub position_limits: PositionLimitConfig,
    pub retry: RetryConfig,
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.circuit_breaker.max_failures == 0 {
            return Err(EngineError::config("circuit breaker max_failures must be positive"));
        }
        if self.rate_limit.max_calls == 0 || self.rate_limit.interval_ms == 0 {
            return Err(EngineError::config(
                "rate limit max_calls and interval_ms must be positive",
            ));
        }
        if self.liquidity.enabled {
            ensure_positive("liquidity max_spread_percent", self.liquidity.max_spread_percent)?;
            ensure_positive("liquidity min_volume_multiplier", self.liquidity.min_volume_multiplier)?;
            if !(self.liquidity.min_opposite_volume >= 0.0) {
                return Err(EngineError::config("liquidity min_opposite_volume must be non-negative"));
            }
        }
        let limits = &self.position_limits;
        ensure_positive("max_position_value", limits.max_position_value)?;
        ensure_percent("max_position_percent", limits.max_position_percent)?;
        ensure_positive("max_daily_loss", limits.max_daily_loss)?;
        if limits.max_open_positions == 0 {
            return Err(EngineError::config("max_open_positions must be positive"));
        }
        if self.retry.max_retries == 0 {
            return Err(EngineError::config("retry max_retries must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(EngineError::config("retry base_delay_ms exceeds max_delay_ms"));
        }
        Ok(())
    }
}
