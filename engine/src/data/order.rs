//! Order side, quotes and order book snapshots

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Label of the book side an order of this side consumes
    pub fn opposite_book(&self) -> &'static str {
        match self {
            OrderSide::Buy => "ask",
            OrderSide::Sell => "bid",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// Best bid/ask at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub bid: f64,
    pub ask: f64,
}

impl MarketQuote {
    /// Create a quote; both sides must be positive and not crossed
    pub fn new(bid: f64, ask: f64) -> Result<Self, EngineError> {
        if !(bid.is_finite() && ask.is_finite()) || bid <= 0.0 || ask <= 0.0 {
            return Err(EngineError::invalid(format!(
                "quote must be positive (bid={}, ask={})",
                bid, ask
            )));
        }
        if ask < bid {
            return Err(EngineError::invalid(format!(
                "crossed quote: ask {} below bid {}",
                ask, bid
            )));
        }
        Ok(Self { bid, ask })
    }

    /// Mid price
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Spread as a percentage of mid: (ask - bid) / mid * 100
    pub fn spread_percent(&self) -> f64 {
        (self.ask - self.bid) / self.mid() * 100.0
    }
}

/// One price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Order book snapshot, best levels first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Create a book from (price, quantity) pairs, best levels first
    pub fn from_levels(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Self {
        let level = |&(price, quantity): &(f64, f64)| BookLevel { price, quantity };
        Self {
            bids: bids.iter().map(level).collect(),
            asks: asks.iter().map(level).collect(),
        }
    }

    /// Best bid/ask, if both sides have levels
    pub fn quote(&self) -> Option<MarketQuote> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        MarketQuote::new(bid, ask).ok()
    }

    /// Levels an order of `side` would trade against
    pub fn opposite_levels(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Total quantity resting on the side an order of `side` would consume
    pub fn opposite_volume(&self, side: OrderSide) -> f64 {
        self.opposite_levels(side).iter().map(|l| l.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_percent() {
        let quote = MarketQuote::new(99.5, 100.5).unwrap();
        assert_eq!(quote.mid(), 100.0);
        assert!((quote.spread_percent() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_crossed_quote_rejected() {
        assert!(MarketQuote::new(101.0, 100.0).is_err());
        assert!(MarketQuote::new(0.0, 100.0).is_err());
    }

    #[test]
    fn test_book_volumes() {
        let book = OrderBook::from_levels(&[(99.0, 2.0), (98.0, 3.0)], &[(101.0, 1.5)]);
        assert_eq!(book.opposite_volume(OrderSide::Buy), 1.5);
        assert_eq!(book.opposite_volume(OrderSide::Sell), 5.0);
        assert_eq!(book.quote().unwrap().bid, 99.0);
    }
}
