//! Bounded history of depth snapshots

use common::{Px, Qty, Ts};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of levels captured per side
pub const SNAPSHOT_DEPTH: usize = 10;

/// Default number of snapshots retained
pub const MAX_SNAPSHOTS: usize = 1000;

/// Aggregated price level: (price, total quantity)
pub type DepthLevel = (Px, Qty);

/// Depth summary of the book at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// When the snapshot was taken
    pub timestamp: Ts,
    /// Best bids first
    pub bid_levels: Vec<DepthLevel>,
    /// Best asks first
    pub ask_levels: Vec<DepthLevel>,
}

impl BookSnapshot {
    /// CRC32 over `price:qty|` per level, bids then asks
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for (price, qty) in self.bid_levels.iter().chain(self.ask_levels.iter()) {
            hasher.update(format!("{}:{}|", price.as_i64(), qty.as_i64()).as_bytes());
        }
        hasher.finalize()
    }
}

/// FIFO store that evicts the oldest snapshot once full
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    snapshots: VecDeque<BookSnapshot>,
    capacity: usize,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SNAPSHOTS)
    }
}

impl SnapshotStore {
    /// Create a store retaining at most `capacity` snapshots
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(MAX_SNAPSHOTS)),
            capacity,
        }
    }

    /// Append a snapshot, evicting from the front past capacity
    pub fn push(&mut self, snapshot: BookSnapshot) {
        self.snapshots.push_back(snapshot);
        self.expire(self.capacity);
    }

    /// Drop oldest snapshots until at most `max` remain
    pub fn expire(&mut self, max: usize) {
        while self.snapshots.len() > max {
            self.snapshots.pop_front();
        }
    }

    /// Retained snapshots, oldest first
    pub fn as_deque(&self) -> &VecDeque<BookSnapshot> {
        &self.snapshots
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<&BookSnapshot> {
        self.snapshots.back()
    }

    /// Number of retained snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
