//! Error types for the order book service

use common::{Px, Qty};
use thiserror::Error;

use crate::events::Side;

/// Why the book refused an event
///
/// Rejections are expected during replay. They are returned inside
/// [`crate::core::ApplyOutcome`] and logged, never raised as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Price or quantity not strictly positive
    #[error("invalid order {order_id}: price and quantity must be > 0 (price={price}, quantity={quantity})")]
    InvalidTerms {
        /// Offending order
        order_id: u64,
        /// Submitted price
        price: Px,
        /// Submitted quantity
        quantity: Qty,
    },

    /// Incoming order would trade against its own resting liquidity
    #[error("self-trade detected for order {order_id} (user {user_id}); ignored")]
    SelfTrade {
        /// Offending order
        order_id: u64,
        /// Shared participant id
        user_id: u64,
    },

    /// A new order reused the id of an order that is still resting
    #[error("order id {order_id} is already resting on the book")]
    DuplicateOrderId {
        /// Offending order
        order_id: u64,
    },

    /// Resting the order would overflow the aggregate quantity of its level
    #[error("order {order_id} would overflow the {side} level total at {price}")]
    QuantityOverflow {
        /// Offending order
        order_id: u64,
        /// Book side of the level
        side: Side,
        /// Level price
        price: Px,
    },
}

impl Rejection {
    /// Short label used for statistics
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidTerms { .. } => "invalid_terms",
            Self::SelfTrade { .. } => "self_trade",
            Self::DuplicateOrderId { .. } => "duplicate_order_id",
            Self::QuantityOverflow { .. } => "quantity_overflow",
        }
    }
}

/// Structural inconsistency found by [`crate::core::OrderBook::verify_integrity`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// Level filed under a key that does not match its price
    #[error("{side} level {price} stored under the wrong key")]
    MisfiledLevel {
        /// Book side
        side: Side,
        /// Level price
        price: Px,
    },

    /// Level present with no orders
    #[error("{side} level {price} is empty")]
    EmptyLevel {
        /// Book side
        side: Side,
        /// Level price
        price: Px,
    },

    /// Queue links disagree between neighbours or with head/tail
    #[error("{side} level {price} has a broken queue")]
    BrokenLink {
        /// Book side
        side: Side,
        /// Level price
        price: Px,
    },

    /// Resting order with price or quantity <= 0
    #[error("order {order_id} rests with non-positive terms")]
    NonPositiveOrder {
        /// Offending order
        order_id: u64,
    },

    /// Order queued under a level of a different price or side
    #[error("order {order_id} is queued at the wrong level")]
    MisplacedOrder {
        /// Offending order
        order_id: u64,
    },

    /// Index entry missing or pointing elsewhere
    #[error("index entry for order {order_id} does not match its queue position")]
    IndexMismatch {
        /// Offending order
        order_id: u64,
    },

    /// Cached level totals differ from the queue contents
    #[error("{side} level {price}: cached quantity {cached}, queued {actual}")]
    LevelTotals {
        /// Book side
        side: Side,
        /// Level price
        price: Px,
        /// Cached total
        cached: Qty,
        /// Sum over queued orders
        actual: Qty,
    },

    /// Orders reachable from levels, index entries and arena slots disagree
    #[error("{linked} queued orders, {indexed} indexed, {arena} stored")]
    SizeMismatch {
        /// Orders reachable from level queues
        linked: usize,
        /// Index entries
        indexed: usize,
        /// Arena slots in use
        arena: usize,
    },
}

/// Errors raised while loading exchange event files
#[derive(Debug, Error)]
pub enum FeedError {
    /// File could not be opened or read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// CSV framing error
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Row shorter than the fixed column layout
    #[error("line {line}: expected at least {expected} fields, found {found}")]
    TooFewFields {
        /// 1-based line number
        line: u64,
        /// Required field count
        expected: usize,
        /// Actual field count
        found: usize,
    },

    /// Numeric field did not parse
    #[error("line {line}: invalid {field} value {value:?}")]
    InvalidField {
        /// 1-based line number
        line: u64,
        /// Column name
        field: &'static str,
        /// Raw text
        value: String,
    },

    /// Order type code outside N/M/X/T
    #[error("line {line}: unknown order type {code:?}")]
    UnknownOrderType {
        /// 1-based line number
        line: u64,
        /// Raw code
        code: String,
    },

    /// Side code outside B/S
    #[error("line {line}: unknown side {code:?}")]
    UnknownSide {
        /// 1-based line number
        line: u64,
        /// Raw code
        code: String,
    },
}

/// Errors raised while writing metrics output
#[derive(Debug, Error)]
pub enum OutputError {
    /// Output file could not be created
    #[error("failed to create {path}: {source}")]
    Create {
        /// Target path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// CSV writer failure
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Flush failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
