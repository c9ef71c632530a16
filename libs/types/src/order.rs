//! Order lifecycle types
//!
//! An order is created by the matching engine, owned by exactly one price
//! level queue while resting, and removed from that queue once its volume
//! reaches zero or it is cancelled. Terminal states are never left.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{OrderId, Ticker, UserId};
use crate::numeric::{Price, Volume};

/// Which side of the book an order sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// The side an order on this side trades against.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    pub fn is_bid(&self) -> bool {
        matches!(self, Side::Bid)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Order lifecycle state.
///
/// `Active → Filled` and `Active → Cancelled` are the only transitions;
/// both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

/// A resting or in-flight order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: UserId,
    pub ticker: Ticker,
    pub side: Side,
    /// Limit price; [`Price::MARKET`] for market orders.
    pub price: Price,
    /// Remaining volume, mutated in place as fills occur.
    pub volume: Volume,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        id: OrderId,
        owner: UserId,
        ticker: Ticker,
        side: Side,
        price: Price,
        volume: Volume,
    ) -> Self {
        Self {
            id,
            owner,
            ticker,
            side,
            price,
            volume,
            status: OrderStatus::Active,
        }
    }

    /// Consume `traded` units of remaining volume.
    ///
    /// Transitions to `Filled` when the remainder reaches zero.
    pub fn fill(&mut self, traded: Volume) {
        self.volume -= traded;
        if self.volume.is_zero() {
            self.status = OrderStatus::Filled;
        }
    }

    /// Transition to `Cancelled`. No-op on terminal orders.
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = OrderStatus::Cancelled;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_order(volume: i64) -> Order {
        Order::new(
            OrderId::new(1),
            UserId::new("alice"),
            Ticker::new("ACME"),
            Side::Bid,
            Price::new(100),
            Volume::new(volume),
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_partial_fill_stays_active() {
        let mut order = make_order(10);
        order.fill(Volume::new(4));
        assert_eq!(order.volume, Volume::new(6));
        assert!(order.is_active());
    }

    #[test]
    fn test_full_fill_is_terminal() {
        let mut order = make_order(10);
        order.fill(Volume::new(10));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_cancel_does_not_leave_filled() {
        let mut order = make_order(5);
        order.fill(Volume::new(5));
        order.cancel();
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_cancel_active() {
        let mut order = make_order(5);
        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }
}
