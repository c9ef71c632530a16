//! Per-participant account state
//!
//! Cash and inventory are exact integers. The cost basis is a running
//! `price × quantity` sum kept in floating point by design: it feeds
//! average-cost and unrealized-PnL display data and is explicitly not a
//! ledger-of-record balance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use types::ids::Ticker;
use types::numeric::Price;

/// Trading capacity model for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMode {
    /// Capacity bounded by cash balance.
    Finite,
    /// Capacity bounded by an absolute position limit instead of cash.
    Infinite { position_limit: i64 },
}

/// Ledger entry for one participant.
#[derive(Debug, Clone)]
pub struct Account {
    pub(crate) cash: i64,
    /// Signed position per ticker; negative means short.
    pub(crate) positions: HashMap<Ticker, i64>,
    /// Quantity committed to resting bids, not yet executed.
    pub(crate) reserved_bid: HashMap<Ticker, i64>,
    /// Quantity committed to resting asks, not yet executed.
    pub(crate) reserved_ask: HashMap<Ticker, i64>,
    /// Running price×quantity sum per ticker; advisory, not an invariant.
    pub(crate) cost_basis: HashMap<Ticker, f64>,
    pub(crate) mode: RiskMode,
    /// Bots bypass balance and inventory checks entirely.
    pub(crate) is_bot: bool,
    /// Whitelisted to run negative cash in Finite mode (test fixtures).
    pub(crate) allow_negative: bool,
}

impl Account {
    pub fn new(cash: i64, mode: RiskMode) -> Self {
        Self {
            cash,
            positions: HashMap::new(),
            reserved_bid: HashMap::new(),
            reserved_ask: HashMap::new(),
            cost_basis: HashMap::new(),
            mode,
            is_bot: false,
            allow_negative: false,
        }
    }

    pub fn cash(&self) -> i64 {
        self.cash
    }

    pub fn mode(&self) -> RiskMode {
        self.mode
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub fn position(&self, ticker: &Ticker) -> i64 {
        self.positions.get(ticker).copied().unwrap_or(0)
    }

    pub fn reserved_bid(&self, ticker: &Ticker) -> i64 {
        self.reserved_bid.get(ticker).copied().unwrap_or(0)
    }

    pub fn reserved_ask(&self, ticker: &Ticker) -> i64 {
        self.reserved_ask.get(ticker).copied().unwrap_or(0)
    }

    pub fn cost_basis(&self, ticker: &Ticker) -> f64 {
        self.cost_basis.get(ticker).copied().unwrap_or(0.0)
    }

    /// Average entry cost per unit, if a position is open.
    pub fn average_cost(&self, ticker: &Ticker) -> Option<f64> {
        let position = self.position(ticker);
        if position == 0 {
            None
        } else {
            Some(self.cost_basis(ticker) / position as f64)
        }
    }

    /// Whether this account may drive its cash negative.
    pub(crate) fn may_run_negative(&self) -> bool {
        self.is_bot || self.allow_negative || matches!(self.mode, RiskMode::Infinite { .. })
    }

    /// Apply a signed position change at a trade price, maintaining the
    /// weighted-average cost basis.
    pub(crate) fn apply_fill(&mut self, ticker: &Ticker, delta: i64, trade_price: Price) {
        let old_qty = self.position(ticker);
        let new_qty = old_qty + delta;
        let basis = self.cost_basis(ticker);

        let new_basis = blend_cost_basis(old_qty, new_qty, basis, trade_price);
        self.cost_basis.insert(ticker.clone(), new_basis);

        if new_qty == 0 {
            self.positions.remove(ticker);
        } else {
            self.positions.insert(ticker.clone(), new_qty);
        }
    }
}

/// Weighted-average cost-basis rule.
///
/// A position crossing through (or starting from) zero collapses the basis
/// to `new_qty × trade_price`; growing a position adds the traded notional;
/// shrinking one scales the basis proportionally so the average cost is
/// unchanged.
pub(crate) fn blend_cost_basis(old_qty: i64, new_qty: i64, basis: f64, trade_price: Price) -> f64 {
    let price = trade_price.as_i64() as f64;
    if new_qty == 0 {
        0.0
    } else if old_qty == 0 || (old_qty > 0) != (new_qty > 0) {
        new_qty as f64 * price
    } else if new_qty.abs() > old_qty.abs() {
        basis + (new_qty - old_qty) as f64 * price
    } else {
        basis * (new_qty as f64 / old_qty as f64)
    }
}
