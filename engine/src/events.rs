//! Outbound engine events
//!
//! The pipeline records what happened during each cycle; the caller drains the
//! queue whenever it likes. The queue is bounded and drops the oldest events when
//! the caller falls behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Candle, OrderSide, RingBuffer};
use crate::portfolio::{ClosedPosition, ExitReason, Position};
use crate::strategy::Signal;

/// Default number of undrained events kept
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something the pipeline did or decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A tracked timeframe closed a candle
    CandleClosed { candle: Candle },
    /// The signal generator ran
    SignalEvaluated { signal: Signal },
    /// A stop-loss, take-profit or trailing stop fired
    ExitTriggered {
        symbol: String,
        reason: ExitReason,
        price: f64,
        time: DateTime<Utc>,
    },
    PositionOpened { position: Position },
    PositionClosed { closed: ClosedPosition },
    /// An order intent was dropped (sizing failure or safety denial)
    TradeRejected {
        symbol: String,
        side: OrderSide,
        reason: String,
    },
}

/// Bounded FIFO of events
#[derive(Debug)]
pub struct EventQueue {
    events: RingBuffer<EngineEvent>,
    dropped: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RingBuffer::new(capacity),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: EngineEvent) {
        if self.events.push(event).is_some() {
            self.dropped += 1;
            tracing::warn!(dropped = self.dropped, "event queue full, dropped oldest event");
        }
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted before being drained
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
