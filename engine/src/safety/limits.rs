//! Liquidity and exposure gates

use crate::config::{LiquidityConfig, PositionLimitConfig};
use crate::data::{OrderBook, OrderSide};
use crate::error::SafetyRejection;

/// Running exposure the position limits are checked against
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exposure {
    /// Realized loss since the last daily reset (positive number)
    pub daily_loss: f64,
    pub open_positions: usize,
    pub portfolio_value: Option<f64>,
}

/// Reject an order the book cannot absorb: too few levels on either side, a wide
/// spread, too little resting volume on the side the order consumes, or a
/// quantity above `min_volume_multiplier` of that volume.
pub fn check_liquidity(
    config: &LiquidityConfig,
    book: &OrderBook,
    side: OrderSide,
    quantity: f64,
) -> Result<(), SafetyRejection> {
    for (name, levels) in [("bid", book.bids.len()), ("ask", book.asks.len())] {
        if levels < config.min_depth_levels {
            return Err(SafetyRejection::InsufficientDepth {
                side: name,
                levels,
                min: config.min_depth_levels,
            });
        }
    }

    if let Some(quote) = book.quote() {
        let spread_percent = quote.spread_percent();
        if spread_percent > config.max_spread_percent {
            return Err(SafetyRejection::SpreadTooWide {
                spread_percent,
                max_percent: config.max_spread_percent,
            });
        }
    }

    let available = book.opposite_volume(side);
    if available < config.min_opposite_volume {
        return Err(SafetyRejection::InsufficientVolume {
            available,
            min: config.min_opposite_volume,
        });
    }

    let allowed = available * config.min_volume_multiplier;
    if quantity > allowed {
        return Err(SafetyRejection::QuantityExceedsLiquidity {
            side,
            quantity,
            allowed,
        });
    }
    Ok(())
}

/// Reject a new position above the notional caps, after the daily loss cap was
/// reached, or when the open-position cap is full
pub fn check_position_limits(
    config: &PositionLimitConfig,
    exposure: &Exposure,
    quantity: f64,
    price: f64,
) -> Result<(), SafetyRejection> {
    let value = quantity * price;
    if value > config.max_position_value {
        return Err(SafetyRejection::PositionValueCap {
            value,
            cap: config.max_position_value,
        });
    }

    if let Some(portfolio_value) = exposure.portfolio_value.filter(|v| *v > 0.0) {
        let percent = value / portfolio_value * 100.0;
        if percent > config.max_position_percent {
            return Err(SafetyRejection::PortfolioPercentCap {
                percent,
                cap_percent: config.max_position_percent,
            });
        }
    }

    if exposure.daily_loss >= config.max_daily_loss {
        return Err(SafetyRejection::DailyLossCap {
            loss: exposure.daily_loss,
            cap: config.max_daily_loss,
        });
    }

    if exposure.open_positions >= config.max_open_positions {
        return Err(SafetyRejection::MaxOpenPositions {
            open: exposure.open_positions,
            cap: config.max_open_positions,
        });
    }
    Ok(())
}
