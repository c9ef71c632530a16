//! Full-book snapshots for client sync
//!
//! A snapshot is taken on the executor, so it can never interleave with a
//! matching pass. It carries the last published sequence number at the time
//! it was built: a client applies the snapshot and resumes replay from
//! `seq + 1`. Changes that were already folded into the snapshot but
//! published afterwards are re-delivered; level changes carry absolute
//! aggregate volumes, so re-applying them is idempotent and the client
//! converges without a gap.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::ids::Ticker;
use types::numeric::{Price, Volume};

/// One aggregated price level in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub price: Price,
    pub volume: Volume,
}

/// Full-depth snapshot of one instrument's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub ticker: Ticker,
    /// Last published sequence at snapshot time; resume replay at `seq + 1`.
    pub seq: u64,
    /// Bid levels, best (highest price) first.
    pub bids: Vec<SnapshotLevel>,
    /// Ask levels, best (lowest price) first.
    pub asks: Vec<SnapshotLevel>,
}

/// Snapshot serialization failures, surfaced to callers as internal errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BookSnapshot {
    pub fn new(
        ticker: Ticker,
        seq: u64,
        bids: Vec<(Price, Volume)>,
        asks: Vec<(Price, Volume)>,
    ) -> Self {
        let level = |(price, volume)| SnapshotLevel { price, volume };
        Self {
            ticker,
            seq,
            bids: bids.into_iter().map(level).collect(),
            asks: asks.into_iter().map(level).collect(),
        }
    }

    /// Render the snapshot as an opaque JSON document for the transport
    /// layer.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether a replay stream starting at `first_seq` connects to this
    /// snapshot without a gap.
    pub fn resumes_from(&self, first_seq: u64) -> bool {
        first_seq <= self.seq + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BookSnapshot {
        BookSnapshot::new(
            Ticker::new("ACME"),
            7,
            vec![
                (Price::new(101), Volume::new(4)),
                (Price::new(100), Volume::new(9)),
            ],
            vec![(Price::new(103), Volume::new(2))],
        )
    }

    #[test]
    fn test_levels_preserved_best_first() {
        let snap = snapshot();
        assert_eq!(snap.bids[0].price, Price::new(101));
        assert_eq!(snap.asks[0].price, Price::new(103));
        assert_eq!(snap.seq, 7);
    }

    #[test]
    fn test_json_roundtrip() {
        let snap = snapshot();
        let json = snap.to_json().unwrap();
        let back: BookSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }

    #[test]
    fn test_resume_point() {
        let snap = snapshot();
        // Overlap with already-folded changes is fine (idempotent).
        assert!(snap.resumes_from(5));
        assert!(snap.resumes_from(8));
        // A stream starting past seq+1 has lost changes.
        assert!(!snap.resumes_from(9));
    }
}
