//! # Limit Order Book Replay
//!
//! Rebuilds a price-time priority limit order book from exchange order
//! events and derives microstructure metrics after every event.
//!
//! ## Layout
//!
//! - [`core`]: the book. Arena-backed FIFO queues per price level, an
//!   order-id index for O(1) cancels, implicit matching of crossing orders,
//!   self-trade prevention and bounded depth snapshots
//! - [`analytics`]: mid, spread, top and depth-weighted order flow imbalance
//! - [`feed`]: exchange CSV dumps into a single time-ordered event stream
//! - [`replay`]: event-by-event driver with statistics
//! - [`output`]: metrics CSV writer and console depth ladder
//! - [`config`]: layered service configuration
//!
//! ```
//! use lob_replay::{EventBuilder, OrderBook, Side};
//! use common::Px;
//!
//! let mut book = OrderBook::new();
//! let mut events = EventBuilder::new();
//! book.apply(&events.new_order(1, Side::Sell, 10_050, 10, 0));
//! book.apply(&events.new_order(2, Side::Buy, 10_000, 5, 0));
//! assert_eq!(book.best_bid_ask(), (Px::from_i64(10_000), Px::from_i64(10_050)));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analytics;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod feed;
pub mod output;
pub mod replay;
pub mod snapshot;

// Re-exports for convenience
pub use crate::analytics::{BookMetrics, MetricsCalculator};
pub use crate::core::{ApplyOutcome, OrderBook, Placement};
pub use crate::error::{FeedError, IntegrityError, OutputError, Rejection};
pub use crate::events::{Event, EventBuilder, EventKind, Order, Side};
pub use crate::replay::{MetricsSink, ReplayConfig, ReplayEngine, ReplayStats};
pub use crate::snapshot::{BookSnapshot, DepthLevel};
