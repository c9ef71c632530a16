//! Bid side of an order book
//!
//! Levels keyed by price in a `BTreeMap`; the best bid is the highest
//! price, so iteration for matching and depth runs back-to-front.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::Order;

use super::price_level::PriceLevel;

#[derive(Debug, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, order: Order) {
        self.levels
            .entry(order.price)
            .or_insert_with(PriceLevel::new)
            .push_back(order);
    }

    /// Highest bid price with resting volume.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    pub fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels
            .iter_mut()
            .next_back()
            .map(|(price, level)| (*price, level))
    }

    /// Remove an order from its level, dropping the level if it empties.
    pub fn remove(&mut self, price: Price, id: OrderId) -> Option<Order> {
        let level = self.levels.get_mut(&price)?;
        let order = level.remove(id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Drop the level at `price` if it has emptied out.
    pub fn prune(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(PriceLevel::is_empty) {
            self.levels.remove(&price);
        }
    }

    pub fn get(&self, price: Price, id: OrderId) -> Option<&Order> {
        self.levels.get(&price)?.get(id)
    }

    /// Aggregate volume resting at `price`; zero when the level is absent.
    pub fn level_volume(&self, price: Price) -> Volume {
        self.levels
            .get(&price)
            .map(PriceLevel::total_volume)
            .unwrap_or(Volume::ZERO)
    }

    /// Aggregated depth, best (highest) price first.
    pub fn depth(&self) -> Vec<(Price, Volume)> {
        self.levels
            .iter()
            .rev()
            .map(|(price, level)| (*price, level.total_volume()))
            .collect()
    }

    /// Drop every level, returning the prices and volumes vacated.
    pub fn clear(&mut self) -> Vec<(Price, Volume)> {
        std::mem::take(&mut self.levels)
            .into_iter()
            .map(|(price, level)| (price, level.total_volume()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
