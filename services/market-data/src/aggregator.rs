//! Pending level-change aggregation
//!
//! Between publish ticks the matching engine may touch the same price level
//! many times. Only the latest aggregate volume per (ticker, side, price)
//! matters to subscribers, so changes are deduplicated last-write-wins
//! before the sequencer ever sees them.

use std::collections::BTreeMap;

use types::events::LevelChange;
use types::ids::Ticker;
use types::numeric::{Price, Volume};
use types::order::Side;

/// Accumulates level changes between publish ticks.
///
/// Backed by a `BTreeMap` so a drained batch comes out in deterministic
/// (ticker, side, price) order.
#[derive(Debug, Default)]
pub struct ChangeAggregator {
    pending: BTreeMap<(Ticker, Side, Price), Volume>,
}

impl ChangeAggregator {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Record a change, overwriting any earlier change to the same level.
    pub fn record(&mut self, change: LevelChange) {
        self.pending.insert(change.key(), change.volume);
    }

    /// Take all pending changes, leaving the aggregator empty.
    pub fn drain(&mut self) -> Vec<LevelChange> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((ticker, side, price), volume)| LevelChange::new(ticker, side, price, volume))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(price: i64, volume: i64) -> LevelChange {
        LevelChange::new(
            Ticker::new("ACME"),
            Side::Bid,
            Price::new(price),
            Volume::new(volume),
        )
    }

    #[test]
    fn test_last_write_wins() {
        let mut agg = ChangeAggregator::new();
        agg.record(change(100, 5));
        agg.record(change(100, 12));
        agg.record(change(100, 7));

        let drained = agg.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].volume, Volume::new(7));
    }

    #[test]
    fn test_distinct_levels_kept_apart() {
        let mut agg = ChangeAggregator::new();
        agg.record(change(100, 5));
        agg.record(change(101, 3));
        agg.record(LevelChange::new(
            Ticker::new("ACME"),
            Side::Ask,
            Price::new(100),
            Volume::new(9),
        ));

        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn test_drain_empties_and_orders() {
        let mut agg = ChangeAggregator::new();
        agg.record(change(105, 1));
        agg.record(change(95, 2));

        let drained = agg.drain();
        assert!(agg.is_empty());
        // Deterministic key order: prices ascending within (ticker, side).
        assert_eq!(drained[0].price, Price::new(95));
        assert_eq!(drained[1].price, Price::new(105));
    }

    #[test]
    fn test_zero_volume_changes_survive_dedup() {
        let mut agg = ChangeAggregator::new();
        agg.record(change(100, 5));
        agg.record(change(100, 0));

        let drained = agg.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].is_removal());
    }
}
