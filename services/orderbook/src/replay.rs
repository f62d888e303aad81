//! Deterministic replay of an exchange event stream
//!
//! Drives the book one event at a time:
//! - Apply the event
//! - Compute metrics at the event's timestamp and hand them to a sink
//! - Snapshot depth every `snapshot_interval` events
//! - Count outcomes, rejections and timestamp regressions

use common::Ts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::analytics::{BookMetrics, DEFAULT_DECAY_LAMBDA, DEFAULT_DEPTH_LEVELS, MetricsCalculator};
use crate::core::{ApplyOutcome, OrderBook};
use crate::error::OutputError;
use crate::events::{Event, EventKind};
use crate::snapshot::MAX_SNAPSHOTS;

/// Configuration for replay engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Levels per side in each metrics row
    pub depth_levels: usize,
    /// Per-level decay for depth OFI, in [0, 1]
    pub decay_lambda: f64,
    /// Events between snapshots
    pub snapshot_interval: u64,
    /// Snapshots retained
    pub snapshot_capacity: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            depth_levels: DEFAULT_DEPTH_LEVELS,
            decay_lambda: DEFAULT_DECAY_LAMBDA,
            snapshot_interval: 1000,
            snapshot_capacity: MAX_SNAPSHOTS,
        }
    }
}

/// Receives one metrics result per replayed event
pub trait MetricsSink {
    /// Consume a metrics row
    fn record(&mut self, metrics: &BookMetrics) -> Result<(), OutputError>;
}

impl MetricsSink for Vec<BookMetrics> {
    fn record(&mut self, metrics: &BookMetrics) -> Result<(), OutputError> {
        self.push(metrics.clone());
        Ok(())
    }
}

/// Replay statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Events processed
    pub events: u64,
    /// New orders seen
    pub new_orders: u64,
    /// Modifies seen
    pub modifies: u64,
    /// Cancels seen
    pub cancels: u64,
    /// Trade prints seen
    pub trades: u64,
    /// Cancels for orders not on the book
    pub cancel_misses: u64,
    /// Resting orders hit by matching
    pub maker_fills: u64,
    /// Matching loops stopped by the head-of-queue guard
    pub self_trade_halts: u64,
    /// Rejections by reason label
    pub rejections: BTreeMap<&'static str, u64>,
    /// Events whose timestamp went backwards
    pub out_of_order: u64,
    /// Snapshots taken
    pub snapshots: u64,
}

impl ReplayStats {
    /// Total rejected events
    pub fn rejected(&self) -> u64 {
        self.rejections.values().sum()
    }

    fn count_kind(&mut self, kind: EventKind) {
        match kind {
            EventKind::New => self.new_orders += 1,
            EventKind::Modify => self.modifies += 1,
            EventKind::Cancel => self.cancels += 1,
            EventKind::Trade => self.trades += 1,
        }
    }

    fn count_outcome(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Placed(placement) => {
                self.maker_fills += placement.maker_fills as u64;
                if placement.self_trade_halted {
                    self.self_trade_halts += 1;
                }
            }
            ApplyOutcome::NotFound { .. } => self.cancel_misses += 1,
            ApplyOutcome::Rejected(reason) => {
                *self.rejections.entry(reason.label()).or_default() += 1;
            }
            ApplyOutcome::Cancelled(_) | ApplyOutcome::TradeIgnored => {}
        }
    }
}

/// Replay engine for deterministic orderbook reconstruction
pub struct ReplayEngine {
    config: ReplayConfig,
    book: OrderBook,
    stats: ReplayStats,
    last_timestamp: Option<Ts>,
}

impl ReplayEngine {
    /// Create a replay engine over an empty book
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            book: OrderBook::with_snapshot_capacity(config.snapshot_capacity),
            config,
            stats: ReplayStats::default(),
            last_timestamp: None,
        }
    }

    /// Process one event and return metrics at its timestamp
    pub fn step(&mut self, event: &Event) -> BookMetrics {
        let index = self.stats.events;
        self.stats.events += 1;
        self.stats.count_kind(event.kind);

        if let Some(last) = self.last_timestamp {
            if event.timestamp < last {
                self.stats.out_of_order += 1;
                warn!(
                    index,
                    timestamp = %event.timestamp,
                    previous = %last,
                    "timestamp went backwards; applying anyway"
                );
            }
        }
        self.last_timestamp = Some(event.timestamp);

        let outcome = self.book.apply(event);
        debug!(index, kind = ?event.kind, order_id = event.order_id, ?outcome, "applied event");
        self.stats.count_outcome(&outcome);

        let metrics = MetricsCalculator::calculate(
            &self.book,
            event.timestamp,
            self.config.depth_levels,
            self.config.decay_lambda,
        );

        if self.config.snapshot_interval > 0 && index % self.config.snapshot_interval == 0 {
            if let Some(snapshot) = self.book.take_snapshot(event.timestamp) {
                self.stats.snapshots += 1;
                debug!(
                    index,
                    timestamp = %snapshot.timestamp,
                    checksum = snapshot.checksum(),
                    "snapshot taken"
                );
            }
        }

        metrics
    }

    /// Replay a whole stream into `sink`
    pub fn run<'a, I, S>(&mut self, events: I, sink: &mut S) -> Result<&ReplayStats, OutputError>
    where
        I: IntoIterator<Item = &'a Event>,
        S: MetricsSink + ?Sized,
    {
        info!(config = ?self.config, "starting replay");
        for event in events {
            let metrics = self.step(event);
            sink.record(&metrics)?;
        }
        self.log_summary();
        Ok(&self.stats)
    }

    /// Emit the run statistics at info level
    pub fn log_summary(&self) {
        let (best_bid, best_ask) = self.book.best_bid_ask();
        info!(
            events = self.stats.events,
            new = self.stats.new_orders,
            modify = self.stats.modifies,
            cancel = self.stats.cancels,
            trade = self.stats.trades,
            rejected = self.stats.rejected(),
            cancel_misses = self.stats.cancel_misses,
            out_of_order = self.stats.out_of_order,
            snapshots = self.stats.snapshots,
            resting = self.book.len(),
            %best_bid,
            %best_ask,
            "replay complete"
        );
        for (reason, count) in &self.stats.rejections {
            info!(reason, count, "rejections");
        }
    }

    /// Current book
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Statistics so far
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }
}
