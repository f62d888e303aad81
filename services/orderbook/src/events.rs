//! Event and order types consumed by the order book
//!
//! Events are plain values produced by the feed adapter. They are never
//! mutated once built; the book copies what it needs out of them.

use common::{Px, Qty, Ts};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bid)
    Buy = 0,
    /// Sell side (ask/offer)
    Sell = 1,
}

impl Side {
    /// Check if this is the buy side
    #[inline]
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Get the opposite side
    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Parse the exchange side code (`B` / `S`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "B" => Some(Side::Buy),
            "S" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Kind of book-affecting action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// New order entering the book
    New = 0,
    /// Existing order replaced (cancel + re-add)
    Modify = 1,
    /// Order removed from the book
    Cancel = 2,
    /// Trade print, informational only
    Trade = 3,
}

impl EventKind {
    /// Parse the exchange order-type code (`N`, `M`, `X`, `T`)
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'N' => Some(EventKind::New),
            'M' => Some(EventKind::Modify),
            'X' => Some(EventKind::Cancel),
            'T' => Some(EventKind::Trade),
            _ => None,
        }
    }
}

/// A single exchange event
///
/// Trade events carry `buy_order_id`/`sell_order_id` and leave `order_id` at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Exchange timestamp (nanoseconds)
    pub timestamp: Ts,
    /// What this event does to the book
    pub kind: EventKind,
    /// Order identifier (0 for trades)
    pub order_id: u64,
    /// Limit price in minor units
    pub price: Px,
    /// Order quantity
    pub quantity: Qty,
    /// Order side
    pub side: Side,
    /// Owning participant (0 = unattributed)
    pub user_id: u64,
    /// Buy order id of a trade print
    pub buy_order_id: u64,
    /// Sell order id of a trade print
    pub sell_order_id: u64,
}

impl Event {
    /// Build a new-order event
    pub fn new_order(
        timestamp: Ts,
        order_id: u64,
        side: Side,
        price: Px,
        quantity: Qty,
        user_id: u64,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::New,
            order_id,
            price,
            quantity,
            side,
            user_id,
            buy_order_id: 0,
            sell_order_id: 0,
        }
    }

    /// Build a modify event carrying the replacement terms
    pub fn modify(
        timestamp: Ts,
        order_id: u64,
        side: Side,
        price: Px,
        quantity: Qty,
        user_id: u64,
    ) -> Self {
        Self {
            kind: EventKind::Modify,
            ..Self::new_order(timestamp, order_id, side, price, quantity, user_id)
        }
    }

    /// Build a cancel event
    pub fn cancel(timestamp: Ts, order_id: u64) -> Self {
        Self {
            kind: EventKind::Cancel,
            ..Self::new_order(timestamp, order_id, Side::Buy, Px::ZERO, Qty::ZERO, 0)
        }
    }

    /// Build a trade print
    pub fn trade(
        timestamp: Ts,
        buy_order_id: u64,
        sell_order_id: u64,
        price: Px,
        quantity: Qty,
    ) -> Self {
        Self {
            timestamp,
            kind: EventKind::Trade,
            order_id: 0,
            price,
            quantity,
            side: Side::Buy,
            user_id: 0,
            buy_order_id,
            sell_order_id,
        }
    }

    /// Check if this is a trade print
    #[inline]
    pub fn is_trade(&self) -> bool {
        self.kind == EventKind::Trade
    }

    /// True if the price/quantity pair could rest on the book
    #[inline]
    pub fn has_valid_terms(&self) -> bool {
        self.price.is_positive() && self.quantity.is_positive()
    }
}

/// Individual resting order (L3 data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier while active
    pub order_id: u64,
    /// Limit price
    pub price: Px,
    /// Remaining quantity, always positive while resting
    pub quantity: Qty,
    /// Side of the order
    pub side: Side,
    /// Owning participant (0 = unattributed)
    pub user_id: u64,
}

impl Order {
    /// Resting order built from an incoming event and its unfilled remainder
    pub fn from_event(event: &Event, remaining: Qty) -> Self {
        Self {
            order_id: event.order_id,
            price: event.price,
            quantity: remaining,
            side: event.side,
            user_id: event.user_id,
        }
    }
}

/// Event builder with a monotonically increasing clock
///
/// Handy for tests and simulations where exchange time is irrelevant but
/// ordering matters.
#[derive(Debug, Default)]
pub struct EventBuilder {
    clock: u64,
}

impl EventBuilder {
    /// Create a new event builder starting at t=0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder whose first event is stamped `start + 1`
    pub fn starting_at(start: Ts) -> Self {
        Self {
            clock: start.as_nanos(),
        }
    }

    fn tick(&mut self) -> Ts {
        self.clock += 1;
        Ts::from_nanos(self.clock)
    }

    /// Build a new-order event
    pub fn new_order(&mut self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u64) -> Event {
        let ts = self.tick();
        Event::new_order(ts, order_id, side, Px::from_i64(price), Qty::from_i64(quantity), user_id)
    }

    /// Build a modify event
    pub fn modify(&mut self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u64) -> Event {
        let ts = self.tick();
        Event::modify(ts, order_id, side, Px::from_i64(price), Qty::from_i64(quantity), user_id)
    }

    /// Build a cancel event
    pub fn cancel(&mut self, order_id: u64) -> Event {
        let ts = self.tick();
        Event::cancel(ts, order_id)
    }

    /// Build a trade print
    pub fn trade(&mut self, buy_order_id: u64, sell_order_id: u64, price: i64, quantity: i64) -> Event {
        let ts = self.tick();
        Event::trade(ts, buy_order_id, sell_order_id, Px::from_i64(price), Qty::from_i64(quantity))
    }

    /// Timestamp of the last event built
    pub fn now(&self) -> Ts {
        Ts::from_nanos(self.clock)
    }
}
