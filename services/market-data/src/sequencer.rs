//! Sequencer and bounded replay log
//!
//! Assigns monotonically increasing sequence numbers to published change
//! batches and retains a bounded recent window for client catch-up. The
//! transport layer detects "requested sequence older than the retained
//! window" via `min_retained_seq` and instructs the client to re-snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use types::events::LevelChange;

/// One published batch. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub seq: u64,
    pub changes: Vec<LevelChange>,
}

/// Monotonic sequence assignment over a bounded ordered log.
#[derive(Debug)]
pub struct Sequencer {
    /// Sequence number the next publish will receive.
    next_seq: u64,
    /// Maximum number of retained entries; oldest evicted past this.
    capacity: usize,
    log: BTreeMap<u64, ReplayEntry>,
}

impl Sequencer {
    /// Create a sequencer retaining at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            next_seq: 1,
            capacity: capacity.max(1),
            log: BTreeMap::new(),
        }
    }

    /// Atomically assign the next sequence number and append the batch,
    /// evicting the oldest entry once capacity is exceeded.
    pub fn publish(&mut self, changes: Vec<LevelChange>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.log.insert(seq, ReplayEntry { seq, changes });
        while self.log.len() > self.capacity {
            if let Some((evicted, _)) = self.log.pop_first() {
                debug!(seq = evicted, "replay entry evicted");
            }
        }
        seq
    }

    /// Fetch a retained batch by sequence number.
    pub fn get(&self, seq: u64) -> Option<&ReplayEntry> {
        self.log.get(&seq)
    }

    /// Oldest retained sequence, if any.
    pub fn min_retained_seq(&self) -> Option<u64> {
        self.log.keys().next().copied()
    }

    /// Most recently assigned sequence, if any.
    pub fn last_seq(&self) -> Option<u64> {
        self.next_seq.checked_sub(1).filter(|&s| s > 0)
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
