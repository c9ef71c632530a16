//! Book-level change events
//!
//! A level change is a snapshot diff, not a trade tick: it reports the new
//! aggregate volume at one (ticker, price, side). Within a publish interval
//! the aggregator deduplicates changes last-write-wins per key, so applying
//! a change is always idempotent.

use serde::{Deserialize, Serialize};

use crate::ids::Ticker;
use crate::numeric::{Price, Volume};
use crate::order::Side;

/// New aggregate volume at one price level.
///
/// `volume` of zero means the level was vacated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub ticker: Ticker,
    pub side: Side,
    pub price: Price,
    pub volume: Volume,
}

impl LevelChange {
    pub fn new(ticker: Ticker, side: Side, price: Price, volume: Volume) -> Self {
        Self {
            ticker,
            side,
            price,
            volume,
        }
    }

    /// Dedup key within a publish interval.
    pub fn key(&self) -> (Ticker, Side, Price) {
        (self.ticker.clone(), self.side, self.price)
    }

    /// Whether this change vacates the level.
    pub fn is_removal(&self) -> bool {
        self.volume.is_zero()
    }
}

/// Deterministic ordering: ticker, then side (bids first), then price.
impl Ord for LevelChange {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ticker
            .cmp(&other.ticker)
            .then(self.side.cmp(&other.side))
            .then(self.price.cmp(&other.price))
    }
}

impl PartialOrd for LevelChange {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
