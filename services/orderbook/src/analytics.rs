//! Order book microstructure metrics
//!
//! Stateless calculations over the current depth of the book:
//! - Mid price and spread from top of book
//! - Top-of-book order flow imbalance (OFI)
//! - Depth OFI with geometric level decay
//! - Per-level bid/ask quantities

use common::{Qty, Ts};
use serde::Serialize;

use crate::core::OrderBook;
use crate::events::Side;
use crate::snapshot::{BookSnapshot, DepthLevel};

/// Default number of levels reported per side
pub const DEFAULT_DEPTH_LEVELS: usize = 5;

/// Default per-level decay factor for depth OFI
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.5;

/// Upper bound on configured depth levels
pub const MAX_DEPTH_LEVELS: usize = 1000;

/// Metrics for the book at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookMetrics {
    /// Raw event timestamp
    pub timestamp_raw: Ts,
    /// `HH:MM:SS.ffffff` in IST
    pub formatted_timestamp: String,
    /// (best bid + best ask) / 2, 0 unless both sides are populated
    pub mid_price: f64,
    /// best ask - best bid, 0 unless both sides are populated
    pub spread: i64,
    /// Imbalance at the first level, in [-1, 1]
    pub ofi_top: f64,
    /// Decay-weighted imbalance across `depth_bids.len()` levels
    pub ofi_depth: f64,
    /// Bid quantity per level, best first, zero-padded
    pub depth_bids: Vec<Qty>,
    /// Ask quantity per level, best first, zero-padded
    pub depth_asks: Vec<Qty>,
}

impl BookMetrics {
    /// Number of levels carried per side
    pub fn depth_levels(&self) -> usize {
        self.depth_bids.len()
    }
}

/// Computes [`BookMetrics`] from book depth
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Metrics for the live book
    #[must_use]
    pub fn calculate(
        book: &OrderBook,
        timestamp: Ts,
        depth_levels: usize,
        decay_lambda: f64,
    ) -> BookMetrics {
        // Top of book is needed even when no levels are reported
        let fetch = depth_levels.max(1);
        let bids = book.depth(Side::Buy, fetch);
        let asks = book.depth(Side::Sell, fetch);
        Self::from_levels(timestamp, &bids, &asks, depth_levels, decay_lambda)
    }

    /// Metrics for a stored snapshot; levels beyond the snapshot depth read as empty
    #[must_use]
    pub fn from_snapshot(
        snapshot: &BookSnapshot,
        depth_levels: usize,
        decay_lambda: f64,
    ) -> BookMetrics {
        Self::from_levels(
            snapshot.timestamp,
            &snapshot.bid_levels,
            &snapshot.ask_levels,
            depth_levels,
            decay_lambda,
        )
    }

    /// Metrics from best-first depth levels
    #[must_use]
    pub fn from_levels(
        timestamp: Ts,
        bid_levels: &[DepthLevel],
        ask_levels: &[DepthLevel],
        depth_levels: usize,
        decay_lambda: f64,
    ) -> BookMetrics {
        let mut metrics = BookMetrics {
            timestamp_raw: timestamp,
            formatted_timestamp: timestamp.format_ist(),
            mid_price: 0.0,
            spread: 0,
            ofi_top: 0.0,
            ofi_depth: 0.0,
            depth_bids: padded(bid_levels, depth_levels),
            depth_asks: padded(ask_levels, depth_levels),
        };

        if let (Some(&(best_bid, _)), Some(&(best_ask, _))) = (bid_levels.first(), ask_levels.first()) {
            if best_bid.is_positive() && best_ask.is_positive() {
                metrics.spread = best_ask.as_i64() - best_bid.as_i64();
                metrics.mid_price = (best_bid.as_f64() + best_ask.as_f64()) / 2.0;
            }
        }

        let bid_top = metrics.depth_bids.first().copied().unwrap_or(Qty::ZERO);
        let ask_top = metrics.depth_asks.first().copied().unwrap_or(Qty::ZERO);
        metrics.ofi_top = imbalance(bid_top.as_f64(), ask_top.as_f64());

        metrics.ofi_depth = decayed_imbalance(&metrics.depth_bids, &metrics.depth_asks, decay_lambda);

        metrics
    }
}

/// Quantities of the first `levels` entries, 0 where a level is absent
fn padded(levels: &[DepthLevel], count: usize) -> Vec<Qty> {
    (0..count)
        .map(|i| levels.get(i).map_or(Qty::ZERO, |&(_, qty)| qty))
        .collect()
}

/// (bid - ask) / (bid + ask), 0 on an empty denominator
#[inline]
fn imbalance(bid: f64, ask: f64) -> f64 {
    let total = bid + ask;
    if total > 0.0 {
        (bid - ask) / total
    } else {
        0.0
    }
}

/// Level `i` weighs `(1 - lambda)^i`; every level adds its weight to the
/// normaliser whether or not it holds quantity.
fn decayed_imbalance(bids: &[Qty], asks: &[Qty], decay_lambda: f64) -> f64 {
    let mut weighted_bid = 0.0;
    let mut weighted_ask = 0.0;
    let mut weight_sum = 0.0;
    let mut decay = 1.0;

    for (bid, ask) in bids.iter().zip(asks) {
        if bid.is_positive() {
            weighted_bid += bid.as_f64() * decay;
        }
        if ask.is_positive() {
            weighted_ask += ask.as_f64() * decay;
        }
        weight_sum += decay;
        decay *= 1.0 - decay_lambda;
    }

    if weight_sum > 0.0 {
        (weighted_bid - weighted_ask) / weight_sum
    } else {
        0.0
    }
}
