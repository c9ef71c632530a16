//! Per-instrument order book
//!
//! One `Book` per ticker, holding a bid side and an ask side. Matching
//! code addresses "the side an aggressor trades against" through the
//! `opposite_*` accessors rather than branching at every call site.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

use types::ids::OrderId;
use types::numeric::{Price, Volume};
use types::order::{Order, Side};

use ask_book::AskBook;
use bid_book::BidBook;
use price_level::PriceLevel;

/// Whether an aggressor at `limit` crosses a resting price on the
/// opposite side.
pub fn crosses(side: Side, limit: Price, resting: Price) -> bool {
    match side {
        Side::Bid => limit >= resting,
        Side::Ask => limit <= resting,
    }
}

#[derive(Debug, Default)]
pub struct Book {
    bids: BidBook,
    asks: AskBook,
}

impl Book {
    pub fn new() -> Self {
        Self {
            bids: BidBook::new(),
            asks: AskBook::new(),
        }
    }

    pub fn insert(&mut self, order: Order) {
        match order.side {
            Side::Bid => self.bids.insert(order),
            Side::Ask => self.asks.insert(order),
        }
    }

    pub fn remove(&mut self, side: Side, price: Price, id: OrderId) -> Option<Order> {
        match side {
            Side::Bid => self.bids.remove(price, id),
            Side::Ask => self.asks.remove(price, id),
        }
    }

    pub fn get_order(&self, side: Side, price: Price, id: OrderId) -> Option<&Order> {
        match side {
            Side::Bid => self.bids.get(price, id),
            Side::Ask => self.asks.get(price, id),
        }
    }

    pub fn best_bid(&self) -> Option<(Price, Volume)> {
        let price = self.bids.best_price()?;
        Some((price, self.bids.level_volume(price)))
    }

    pub fn best_ask(&self) -> Option<(Price, Volume)> {
        let price = self.asks.best_price()?;
        Some((price, self.asks.level_volume(price)))
    }

    /// Best resting price on the side an aggressor on `side` trades against.
    pub fn opposite_best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Bid => self.asks.best_price(),
            Side::Ask => self.bids.best_price(),
        }
    }

    pub fn opposite_best_level_mut(&mut self, side: Side) -> Option<(Price, &mut PriceLevel)> {
        match side {
            Side::Bid => self.asks.best_level_mut(),
            Side::Ask => self.bids.best_level_mut(),
        }
    }

    pub fn opposite_is_empty(&self, side: Side) -> bool {
        match side {
            Side::Bid => self.asks.is_empty(),
            Side::Ask => self.bids.is_empty(),
        }
    }

    /// Drop the opposite-side level at `price` once emptied by matching.
    pub fn prune_opposite(&mut self, side: Side, price: Price) {
        match side {
            Side::Bid => self.asks.prune(price),
            Side::Ask => self.bids.prune(price),
        }
    }

    pub fn level_volume(&self, side: Side, price: Price) -> Volume {
        match side {
            Side::Bid => self.bids.level_volume(price),
            Side::Ask => self.asks.level_volume(price),
        }
    }

    /// Aggregated depth for one side, best price first.
    pub fn depth(&self, side: Side) -> Vec<(Price, Volume)> {
        match side {
            Side::Bid => self.bids.depth(),
            Side::Ask => self.asks.depth(),
        }
    }

    /// Empty both sides, returning every vacated (side, price, volume).
    pub fn clear(&mut self) -> Vec<(Side, Price, Volume)> {
        let mut vacated: Vec<(Side, Price, Volume)> = self
            .bids
            .clear()
            .into_iter()
            .map(|(price, volume)| (Side::Bid, price, volume))
            .collect();
        vacated.extend(
            self.asks
                .clear()
                .into_iter()
                .map(|(price, volume)| (Side::Ask, price, volume)),
        );
        vacated
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{Ticker, UserId};

    fn order(id: u64, side: Side, price: i64, volume: i64) -> Order {
        Order::new(
            OrderId::new(id),
            UserId::new("alice"),
            Ticker::new("ACME"),
            side,
            Price::new(price),
            Volume::new(volume),
        )
    }

    #[test]
    fn test_crossing_rules() {
        assert!(crosses(Side::Bid, Price::new(100), Price::new(100)));
        assert!(crosses(Side::Bid, Price::new(101), Price::new(100)));
        assert!(!crosses(Side::Bid, Price::new(99), Price::new(100)));
        assert!(crosses(Side::Ask, Price::new(100), Price::new(100)));
        assert!(!crosses(Side::Ask, Price::new(101), Price::new(100)));
    }

    #[test]
    fn test_opposite_side_dispatch() {
        let mut book = Book::new();
        book.insert(order(1, Side::Bid, 99, 5));
        book.insert(order(2, Side::Ask, 101, 3));

        // A buyer trades against asks, a seller against bids.
        assert_eq!(book.opposite_best_price(Side::Bid), Some(Price::new(101)));
        assert_eq!(book.opposite_best_price(Side::Ask), Some(Price::new(99)));
    }

    #[test]
    fn test_clear_covers_both_sides() {
        let mut book = Book::new();
        book.insert(order(1, Side::Bid, 99, 5));
        book.insert(order(2, Side::Ask, 101, 3));

        let vacated = book.clear();
        assert_eq!(vacated.len(), 2);
        assert!(book.is_empty());
        assert!(vacated.contains(&(Side::Bid, Price::new(99), Volume::new(5))));
        assert!(vacated.contains(&(Side::Ask, Price::new(101), Volume::new(3))));
    }
}
