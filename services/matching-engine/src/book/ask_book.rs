//! Ask side of an order book
//!
//! Mirror of the bid side with inverted priority: the best ask is the
//! lowest price, so matching and depth iterate front-to-back.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::Order;

use super::price_level::PriceLevel;

#[derive(Debug, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
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

    /// Lowest ask price with resting volume.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    pub fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels
            .iter_mut()
            .next()
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

    /// Aggregated depth, best (lowest) price first.
    pub fn depth(&self) -> Vec<(Price, Volume)> {
        self.levels
            .iter()
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

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{Ticker, UserId};
    use types::order::Side;

    fn ask(id: u64, price: i64, volume: i64) -> Order {
        Order::new(
            OrderId::new(id),
            UserId::new("bob"),
            Ticker::new("ACME"),
            Side::Ask,
            Price::new(price),
            Volume::new(volume),
        )
    }

    #[test]
    fn test_best_is_lowest_price() {
        let mut book = AskBook::new();
        book.insert(ask(1, 105, 5));
        book.insert(ask(2, 103, 3));
        book.insert(ask(3, 104, 2));

        assert_eq!(book.best_price(), Some(Price::new(103)));
        let depth = book.depth();
        assert_eq!(depth[0], (Price::new(103), Volume::new(3)));
        assert_eq!(depth[2], (Price::new(105), Volume::new(5)));
    }

    #[test]
    fn test_level_volume_aggregates_orders() {
        let mut book = AskBook::new();
        book.insert(ask(1, 103, 5));
        book.insert(ask(2, 103, 3));

        assert_eq!(book.level_volume(Price::new(103)), Volume::new(8));
        assert_eq!(book.level_volume(Price::new(104)), Volume::ZERO);
    }
}
