//! Core order book state machine
//!
//! Price-time priority book rebuilt from exchange order events:
//! - L3 storage: every resting order lives in a slab arena, threaded into a
//!   doubly-linked FIFO per price level, so a handle stays valid no matter
//!   which siblings are removed
//! - L2 views: levels keep a cached order count and total quantity
//! - Matching is a side effect of crossing New/Modify events; no trade
//!   records are produced
//! - Bounded snapshot history of top-of-book depth

use ahash::AHashMap;
use common::{Px, Qty, Ts};
use slab::Slab;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

use crate::error::{IntegrityError, Rejection};
use crate::events::{Event, EventKind, Order, Side};
use crate::snapshot::{BookSnapshot, DepthLevel, SNAPSHOT_DEPTH, SnapshotStore};

/// Stable slot of an order in the arena
type Handle = usize;

/// Arena node: the order plus its neighbours in the level queue
#[derive(Debug, Clone)]
struct OrderNode {
    order: Order,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// A price level: FIFO queue of orders sharing one price and side
#[derive(Debug, Clone)]
struct PriceLevel {
    price: Px,
    head: Option<Handle>,
    tail: Option<Handle>,
    order_count: usize,
    total_quantity: Qty,
}

impl PriceLevel {
    fn new(price: Px) -> Self {
        Self {
            price,
            head: None,
            tail: None,
            order_count: 0,
            total_quantity: Qty::ZERO,
        }
    }
}

/// Where a resting order lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderLocation {
    price: Px,
    side: Side,
    handle: Handle,
}

/// Iterates a level's orders oldest first
struct LevelIter<'a> {
    orders: &'a Slab<OrderNode>,
    cur: Option<Handle>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.orders.get(self.cur?)?;
        self.cur = node.next;
        Some(&node.order)
    }
}

/// Result of placing a New or Modify event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Incoming order id
    pub order_id: u64,
    /// Quantity matched against resting orders
    pub filled: Qty,
    /// Quantity left resting on the book
    pub resting: Qty,
    /// Number of resting orders touched by matching
    pub maker_fills: usize,
    /// Matching stopped on a same-user order at the head of a level
    pub self_trade_halted: bool,
    /// Order removed by a Modify before re-adding
    pub replaced: Option<Order>,
}

/// What applying one event did to the book
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New or modified order was matched and/or rested
    Placed(Placement),
    /// Resting order was removed
    Cancelled(Order),
    /// Cancel target was not on the book (already filled, cancelled or unknown)
    NotFound {
        /// Requested order id
        order_id: u64,
    },
    /// Event was refused. For a Modify the original order is already gone.
    Rejected(Rejection),
    /// Trade print accepted without touching the book
    TradeIgnored,
}

impl ApplyOutcome {
    /// Rejection reason, if any
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Matching summary for one incoming order
struct MatchResult {
    remaining: Qty,
    maker_fills: usize,
    halted: bool,
}

/// The main order book structure
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Bid levels - key is negative price so iteration runs best (highest) first
    bids: BTreeMap<i64, PriceLevel>,
    /// Ask levels - key is price, best (lowest) first
    asks: BTreeMap<i64, PriceLevel>,
    /// Arena of resting orders
    orders: Slab<OrderNode>,
    /// order_id -> location, present iff the order rests on the book
    index: AHashMap<u64, OrderLocation>,
    /// Bounded depth history
    snapshots: SnapshotStore,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Create an empty book with the default snapshot capacity
    pub fn new() -> Self {
        Self::with_snapshot_capacity(crate::snapshot::MAX_SNAPSHOTS)
    }

    /// Create an empty book retaining at most `capacity` snapshots
    pub fn with_snapshot_capacity(capacity: usize) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: Slab::new(),
            index: AHashMap::new(),
            snapshots: SnapshotStore::with_capacity(capacity),
        }
    }

    /// Apply one exchange event
    pub fn apply(&mut self, event: &Event) -> ApplyOutcome {
        match event.kind {
            EventKind::New => self.place(event, true, None),
            EventKind::Modify => {
                // Only the head-of-queue guard applies on this path.
                let replaced = self.cancel_order(event.order_id);
                self.place(event, false, replaced)
            }
            EventKind::Cancel => match self.cancel_order(event.order_id) {
                Some(order) => ApplyOutcome::Cancelled(order),
                None => ApplyOutcome::NotFound {
                    order_id: event.order_id,
                },
            },
            EventKind::Trade => ApplyOutcome::TradeIgnored,
        }
    }

    fn place(&mut self, event: &Event, full_scan: bool, replaced: Option<Order>) -> ApplyOutcome {
        if !event.has_valid_terms() {
            let reason = Rejection::InvalidTerms {
                order_id: event.order_id,
                price: event.price,
                quantity: event.quantity,
            };
            warn!(order_id = event.order_id, "{reason}");
            return ApplyOutcome::Rejected(reason);
        }

        if self.index.contains_key(&event.order_id) {
            let reason = Rejection::DuplicateOrderId {
                order_id: event.order_id,
            };
            warn!(order_id = event.order_id, "{reason}");
            return ApplyOutcome::Rejected(reason);
        }

        // Same-side levels are untouched by matching, so the full quantity bounds the rest
        if self
            .volume_at_price(event.price, event.side)
            .checked_add(event.quantity)
            .is_none()
        {
            let reason = Rejection::QuantityOverflow {
                order_id: event.order_id,
                side: event.side,
                price: event.price,
            };
            warn!(order_id = event.order_id, "{reason}");
            return ApplyOutcome::Rejected(reason);
        }

        if full_scan && self.would_self_trade(event) {
            let reason = Rejection::SelfTrade {
                order_id: event.order_id,
                user_id: event.user_id,
            };
            warn!(order_id = event.order_id, user_id = event.user_id, "{reason}");
            return ApplyOutcome::Rejected(reason);
        }

        let matched = self.match_incoming(event);
        if matched.remaining.is_positive() {
            self.insert_resting(Order::from_event(event, matched.remaining));
        }

        ApplyOutcome::Placed(Placement {
            order_id: event.order_id,
            filled: event.quantity - matched.remaining,
            resting: matched.remaining,
            maker_fills: matched.maker_fills,
            self_trade_halted: matched.halted,
            replaced,
        })
    }

    /// Walk the opposite side in price-time priority, consuming liquidity
    fn match_incoming(&mut self, event: &Event) -> MatchResult {
        let opposite = event.side.opposite();
        let mut result = MatchResult {
            remaining: event.quantity,
            maker_fills: 0,
            halted: false,
        };

        while result.remaining.is_positive() {
            let Some((level_price, head)) = self
                .levels(opposite)
                .values()
                .next()
                .map(|level| (level.price, level.head))
            else {
                break;
            };
            if !crosses(event.side, event.price, level_price) {
                break;
            }
            let Some(head) = head else {
                break;
            };
            let Some(maker) = self.orders.get(head).map(|node| node.order) else {
                break;
            };

            if event.user_id != 0 && maker.user_id == event.user_id {
                debug!(
                    order_id = event.order_id,
                    maker_order_id = maker.order_id,
                    side = %event.side,
                    "prevented self-trade on match; remainder rests"
                );
                result.halted = true;
                break;
            }

            if result.remaining >= maker.quantity {
                result.remaining -= maker.quantity;
                self.remove_handle(head);
            } else {
                self.reduce_quantity(head, result.remaining);
                result.remaining = Qty::ZERO;
            }
            result.maker_fills += 1;

            debug!(
                taker = event.order_id,
                maker = maker.order_id,
                price = %level_price,
                remaining = %result.remaining,
                "matched against resting order"
            );
        }

        result
    }

    /// Append an order at the tail of its level, creating the level if needed
    fn insert_resting(&mut self, order: Order) {
        let handle = self.orders.insert(OrderNode {
            order,
            prev: None,
            next: None,
        });

        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = levels
            .entry(price_key(order.price, order.side))
            .or_insert_with(|| PriceLevel::new(order.price));

        let prev_tail = level.tail;
        if prev_tail.is_none() {
            level.head = Some(handle);
        }
        level.tail = Some(handle);
        level.order_count += 1;
        level.total_quantity += order.quantity;

        if let Some(tail) = prev_tail.and_then(|t| self.orders.get_mut(t)) {
            tail.next = Some(handle);
        }
        if let Some(node) = self.orders.get_mut(handle) {
            node.prev = prev_tail;
        }

        self.index.insert(
            order.order_id,
            OrderLocation {
                price: order.price,
                side: order.side,
                handle,
            },
        );
    }

    /// Shrink a resting order in place, keeping its queue position
    fn reduce_quantity(&mut self, handle: Handle, by: Qty) {
        let Some(node) = self.orders.get_mut(handle) else {
            return;
        };
        node.order.quantity -= by;
        let (price, side) = (node.order.price, node.order.side);

        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = levels.get_mut(&price_key(price, side)) {
            level.total_quantity -= by;
        }
    }

    /// Unlink an order from its level, the arena and the index
    fn remove_handle(&mut self, handle: Handle) -> Option<Order> {
        let node = self.orders.try_remove(handle)?;

        if let Some(prev) = node.prev.and_then(|p| self.orders.get_mut(p)) {
            prev.next = node.next;
        }
        if let Some(next) = node.next.and_then(|n| self.orders.get_mut(n)) {
            next.prev = node.prev;
        }

        let order = node.order;
        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let key = price_key(order.price, order.side);
        if let Some(level) = levels.get_mut(&key) {
            if level.head == Some(handle) {
                level.head = node.next;
            }
            if level.tail == Some(handle) {
                level.tail = node.prev;
            }
            level.order_count = level.order_count.saturating_sub(1);
            level.total_quantity -= order.quantity;

            if level.order_count == 0 {
                levels.remove(&key);
            }
        }

        self.index.remove(&order.order_id);
        Some(order)
    }

    /// Cancel a resting order by id; unknown ids are a silent no-op
    pub fn cancel_order(&mut self, order_id: u64) -> Option<Order> {
        let location = self.index.get(&order_id).copied()?;
        self.remove_handle(location.handle)
    }

    /// Best bid and best ask; 0 stands for an empty side
    pub fn best_bid_ask(&self) -> (Px, Px) {
        let best = |side| {
            self.levels(side)
                .values()
                .next()
                .map_or(Px::ZERO, |level| level.price)
        };
        (best(Side::Buy), best(Side::Sell))
    }

    /// Top `levels` price levels of one side, best first
    pub fn depth(&self, side: Side, levels: usize) -> Vec<DepthLevel> {
        self.levels(side)
            .values()
            .take(levels)
            .map(|level| (level.price, level.total_quantity))
            .collect()
    }

    /// Total resting quantity at an exact price
    pub fn volume_at_price(&self, price: Px, side: Side) -> Qty {
        self.levels(side)
            .get(&price_key(price, side))
            .map_or(Qty::ZERO, |level| level.total_quantity)
    }

    /// Number of resting orders on one side
    pub fn order_count(&self, side: Side) -> usize {
        self.levels(side).values().map(|level| level.order_count).sum()
    }

    /// Number of populated price levels on one side
    pub fn level_count(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Total resting orders on both sides
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when nothing rests on the book
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a resting order
    pub fn order(&self, order_id: u64) -> Option<&Order> {
        let location = self.index.get(&order_id)?;
        self.orders.get(location.handle).map(|node| &node.order)
    }

    /// Orders resting at one price, oldest first
    pub fn orders_at(&self, price: Px, side: Side) -> Vec<Order> {
        self.levels(side)
            .get(&price_key(price, side))
            .map(|level| self.level_orders(level).copied().collect())
            .unwrap_or_default()
    }

    /// True if `event` would meet resting liquidity of its own user at a
    /// crossing price. Never mutates the book.
    pub fn would_self_trade(&self, event: &Event) -> bool {
        if event.user_id == 0 {
            return false;
        }

        for level in self.levels(event.side.opposite()).values() {
            if !crosses(event.side, event.price, level.price) {
                break;
            }
            if self
                .level_orders(level)
                .any(|order| order.user_id == event.user_id)
            {
                return true;
            }
        }

        false
    }

    /// Capture top-of-book depth into the snapshot history
    ///
    /// Returns the stored snapshot; `None` only with a zero retention limit.
    pub fn take_snapshot(&mut self, timestamp: Ts) -> Option<&BookSnapshot> {
        let snapshot = BookSnapshot {
            timestamp,
            bid_levels: self.depth(Side::Buy, SNAPSHOT_DEPTH),
            ask_levels: self.depth(Side::Sell, SNAPSHOT_DEPTH),
        };
        self.snapshots.push(snapshot);
        self.snapshots.latest()
    }

    /// Drop the oldest snapshots until at most `max` remain
    pub fn expire_old_snapshots(&mut self, max: usize) {
        self.snapshots.expire(max);
    }

    /// Retained snapshots, oldest first
    pub fn snapshots(&self) -> &VecDeque<BookSnapshot> {
        self.snapshots.as_deque()
    }

    /// Check that the index, level queues and arena agree with each other
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        let mut linked = 0usize;

        for side in [Side::Buy, Side::Sell] {
            for (key, level) in self.levels(side) {
                if *key != price_key(level.price, side) {
                    return Err(IntegrityError::MisfiledLevel {
                        side,
                        price: level.price,
                    });
                }
                if level.order_count == 0 || level.head.is_none() {
                    return Err(IntegrityError::EmptyLevel {
                        side,
                        price: level.price,
                    });
                }

                let mut count = 0usize;
                let mut total = Qty::ZERO;
                let mut prev = None;
                let mut cur = level.head;

                while let Some(handle) = cur {
                    let node = self.orders.get(handle).ok_or(IntegrityError::BrokenLink {
                        side,
                        price: level.price,
                    })?;
                    if node.prev != prev || count > self.orders.len() {
                        return Err(IntegrityError::BrokenLink {
                            side,
                            price: level.price,
                        });
                    }

                    let order = node.order;
                    if !order.price.is_positive() || !order.quantity.is_positive() {
                        return Err(IntegrityError::NonPositiveOrder {
                            order_id: order.order_id,
                        });
                    }
                    if order.price != level.price || order.side != side {
                        return Err(IntegrityError::MisplacedOrder {
                            order_id: order.order_id,
                        });
                    }
                    let expected = OrderLocation {
                        price: level.price,
                        side,
                        handle,
                    };
                    if self.index.get(&order.order_id) != Some(&expected) {
                        return Err(IntegrityError::IndexMismatch {
                            order_id: order.order_id,
                        });
                    }

                    count += 1;
                    total += order.quantity;
                    prev = Some(handle);
                    cur = node.next;
                }

                if level.tail != prev {
                    return Err(IntegrityError::BrokenLink {
                        side,
                        price: level.price,
                    });
                }
                if count != level.order_count || total != level.total_quantity {
                    return Err(IntegrityError::LevelTotals {
                        side,
                        price: level.price,
                        cached: level.total_quantity,
                        actual: total,
                    });
                }
                linked += count;
            }
        }

        if linked != self.index.len() || linked != self.orders.len() {
            return Err(IntegrityError::SizeMismatch {
                linked,
                indexed: self.index.len(),
                arena: self.orders.len(),
            });
        }

        Ok(())
    }

    #[inline]
    fn levels(&self, side: Side) -> &BTreeMap<i64, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn level_orders<'a>(&'a self, level: &PriceLevel) -> LevelIter<'a> {
        LevelIter {
            orders: &self.orders,
            cur: level.head,
        }
    }
}

/// BTreeMap key: bids negated so ascending key order is best-first on both sides
#[inline]
fn price_key(price: Px, side: Side) -> i64 {
    match side {
        Side::Buy => -price.as_i64(),
        Side::Sell => price.as_i64(),
    }
}

/// Would an order on `side` at `price` trade against `opposite_price`?
#[inline]
fn crosses(side: Side, price: Px, opposite_price: Px) -> bool {
    match side {
        Side::Buy => price >= opposite_price,
        Side::Sell => price <= opposite_price,
    }
}
