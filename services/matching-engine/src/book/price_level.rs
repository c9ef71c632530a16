//! FIFO queue of orders at a single price
//!
//! Orders within a level trade strictly in arrival order. The level keeps a
//! running aggregate volume so depth queries and level-change events never
//! re-walk the queue.

use std::collections::VecDeque;

use types::ids::OrderId;
use types::numeric::Volume;
use types::order::Order;

/// All resting orders at one price, oldest first.
#[derive(Debug, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    total: Volume,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total: Volume::ZERO,
        }
    }

    /// Append an order at the back of the time-priority queue.
    pub fn push_back(&mut self, order: Order) {
        self.total += order.volume;
        self.orders.push_back(order);
    }

    /// The order next in line to trade.
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Consume `traded` units from the front order.
    ///
    /// Returns the order, now `Filled`, when the trade exhausts it; the
    /// caller must not pass more than the front order's remaining volume.
    pub fn consume_front(&mut self, traded: Volume) -> Option<Order> {
        let front = self.orders.front_mut()?;
        front.fill(traded);
        self.total -= traded;
        if front.volume.is_zero() {
            self.orders.pop_front()
        } else {
            None
        }
    }

    /// Remove an order by id regardless of queue position.
    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == id)?;
        let order = self.orders.remove(pos)?;
        self.total -= order.volume;
        Some(order)
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Aggregate resting volume at this price.
    pub fn total_volume(&self) -> Volume {
        self.total
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{Ticker, UserId};
    use types::numeric::Price;
    use types::order::{OrderStatus, Side};

    fn order(id: u64, volume: i64) -> Order {
        Order::new(
            OrderId::new(id),
            UserId::new("alice"),
            Ticker::new("ACME"),
            Side::Bid,
            Price::new(100),
            Volume::new(volume),
        )
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 5));
        level.push_back(order(2, 3));

        assert_eq!(level.front().unwrap().id, OrderId::new(1));
        assert_eq!(level.total_volume(), Volume::new(8));
    }

    #[test]
    fn test_partial_consume_keeps_front() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 5));

        assert!(level.consume_front(Volume::new(2)).is_none());
        assert_eq!(level.front().unwrap().volume, Volume::new(3));
        assert_eq!(level.total_volume(), Volume::new(3));
    }

    #[test]
    fn test_full_consume_pops_filled_order() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 5));
        level.push_back(order(2, 4));

        let done = level.consume_front(Volume::new(5)).unwrap();
        assert_eq!(done.id, OrderId::new(1));
        assert_eq!(done.status, OrderStatus::Filled);
        assert_eq!(level.front().unwrap().id, OrderId::new(2));
        assert_eq!(level.total_volume(), Volume::new(4));
    }

    #[test]
    fn test_remove_mid_queue() {
        let mut level = PriceLevel::new();
        level.push_back(order(1, 5));
        level.push_back(order(2, 3));
        level.push_back(order(3, 2));

        let removed = level.remove(OrderId::new(2)).unwrap();
        assert_eq!(removed.volume, Volume::new(3));
        assert_eq!(level.total_volume(), Volume::new(7));
        assert_eq!(level.order_count(), 2);
        assert!(level.remove(OrderId::new(2)).is_none());
    }
}
