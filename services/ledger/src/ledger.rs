//! The ledger proper
//!
//! All quantity and price arithmetic is integer; rejections leave state
//! untouched. Accounts live in a `BTreeMap` for deterministic iteration.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::ids::{OrderId, Ticker, UserId};
use types::numeric::Price;
use types::order::{Order, Side};

use crate::account::{Account, RiskMode};

/// Seed values applied when a user or bot is first initialized.
///
/// Supplied once at startup as plain configuration; the ledger never reads
/// files.
#[derive(Debug, Clone)]
pub struct LedgerDefaults {
    /// Starting cash for Finite-mode accounts.
    pub cash: i64,
    /// Starting inventory per ticker.
    pub inventory: HashMap<Ticker, i64>,
    /// Risk model applied to new (non-bot) users.
    pub mode: RiskMode,
}

impl Default for LedgerDefaults {
    fn default() -> Self {
        Self {
            cash: 100_000,
            inventory: HashMap::new(),
            mode: RiskMode::Finite,
        }
    }
}

/// One row of the PnL leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub user: UserId,
    pub cash: i64,
    pub pnl: f64,
}

/// Structured account detail report for the query API.
///
/// Plain data; the transport layer owns the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReport {
    pub user: UserId,
    pub cash: i64,
    pub positions: Vec<PositionReport>,
    pub open_orders: Vec<OpenOrderReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub ticker: Ticker,
    pub position: i64,
    pub average_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrderReport {
    pub order_id: OrderId,
    pub ticker: Ticker,
    pub side: Side,
    pub price: Price,
    pub volume: i64,
}

/// Per-user cash, inventory, and reservation bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: BTreeMap<UserId, Account>,
    defaults: LedgerDefaults,
}

impl Ledger {
    pub fn new(defaults: LedgerDefaults) -> Self {
        Self {
            accounts: BTreeMap::new(),
            defaults,
        }
    }

    /// Initialize a user with default cash and inventory. Re-init is a no-op.
    pub fn init_user(&mut self, user: &UserId) {
        if self.accounts.contains_key(user) {
            debug!(user = %user, "init_user: already initialized");
            return;
        }
        let mut account = Account::new(self.defaults.cash, self.defaults.mode);
        for (ticker, qty) in &self.defaults.inventory {
            if *qty != 0 {
                account.positions.insert(ticker.clone(), *qty);
            }
        }
        debug!(user = %user, cash = account.cash(), "user initialized");
        self.accounts.insert(user.clone(), account);
    }

    /// Initialize a bot account. Bots bypass balance and inventory checks.
    pub fn init_bot(&mut self, user: &UserId) {
        if self.accounts.contains_key(user) {
            debug!(user = %user, "init_bot: already initialized");
            return;
        }
        let mut account = Account::new(self.defaults.cash, self.defaults.mode);
        account.is_bot = true;
        debug!(user = %user, "bot initialized");
        self.accounts.insert(user.clone(), account);
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.accounts.contains_key(user)
    }

    pub fn is_bot(&self, user: &UserId) -> bool {
        self.accounts.get(user).map(Account::is_bot).unwrap_or(false)
    }

    pub fn account(&self, user: &UserId) -> Option<&Account> {
        self.accounts.get(user)
    }

    pub fn balance(&self, user: &UserId) -> Option<i64> {
        self.accounts.get(user).map(Account::cash)
    }

    pub fn position(&self, user: &UserId, ticker: &Ticker) -> i64 {
        self.accounts
            .get(user)
            .map(|a| a.position(ticker))
            .unwrap_or(0)
    }

    pub fn mode(&self, user: &UserId) -> Option<RiskMode> {
        self.accounts.get(user).map(Account::mode)
    }

    /// Whitelist a Finite-mode account to run negative cash (test fixtures).
    pub fn set_allow_negative(&mut self, user: &UserId, allow: bool) {
        if let Some(account) = self.accounts.get_mut(user) {
            account.allow_negative = allow;
        }
    }

    /// Apply a cash delta. Rejects, leaving state unchanged, when the result
    /// would be negative for a Finite-mode account without the negative
    /// allowance.
    pub fn adjust_cash(&mut self, user: &UserId, delta: i64) -> bool {
        let Some(account) = self.accounts.get_mut(user) else {
            return false;
        };
        let next = account.cash + delta;
        if next < 0 && !account.may_run_negative() {
            debug!(user = %user, delta, cash = account.cash, "cash adjustment refused");
            return false;
        }
        account.cash = next;
        true
    }

    /// Move cash from one account to another unconditionally.
    ///
    /// Used to settle an already-admitted trade. Admission decisions were
    /// made at order entry, so settlement never re-applies the Finite-mode
    /// floor; Infinite-mode buyers may legitimately go negative here.
    pub fn transfer(&mut self, from: &UserId, to: &UserId, amount: i64) {
        if let Some(account) = self.accounts.get_mut(from) {
            account.cash -= amount;
        }
        if let Some(account) = self.accounts.get_mut(to) {
            account.cash += amount;
        }
    }

    /// Apply a signed position change at a trade price, updating the
    /// weighted-average cost basis.
    pub fn adjust_position(&mut self, user: &UserId, ticker: &Ticker, delta: i64, trade_price: Price) {
        if let Some(account) = self.accounts.get_mut(user) {
            account.apply_fill(ticker, delta, trade_price);
        }
    }

    /// Adjust the quantity committed to resting bids.
    pub fn adjust_reserved_bid(&mut self, user: &UserId, ticker: &Ticker, delta: i64) {
        if let Some(account) = self.accounts.get_mut(user) {
            adjust_reservation(account.reserved_bid.entry(ticker.clone()).or_insert(0), user, ticker, delta);
            if account.reserved_bid.get(ticker) == Some(&0) {
                account.reserved_bid.remove(ticker);
            }
        }
    }

    /// Adjust the quantity committed to resting asks.
    pub fn adjust_reserved_ask(&mut self, user: &UserId, ticker: &Ticker, delta: i64) {
        if let Some(account) = self.accounts.get_mut(user) {
            adjust_reservation(account.reserved_ask.entry(ticker.clone()).or_insert(0), user, ticker, delta);
            if account.reserved_ask.get(ticker) == Some(&0) {
                account.reserved_ask.remove(ticker);
            }
        }
    }

    /// Zero every user's reservations for one ticker.
    ///
    /// Used by the administrative price reset, which mass-cancels resting
    /// orders engine-side instead of walking them one by one.
    pub fn clear_reservations(&mut self, ticker: &Ticker) {
        for account in self.accounts.values_mut() {
            account.reserved_bid.remove(ticker);
            account.reserved_ask.remove(ticker);
        }
    }

    /// How many units the user could still bid for at `price`.
    ///
    /// Finite mode: bounded by cash. Infinite mode: bounded by the position
    /// limit net of current exposure, independent of price.
    pub fn available_bid_capacity(&self, user: &UserId, ticker: &Ticker, price: Price) -> i64 {
        let Some(account) = self.accounts.get(user) else {
            return 0;
        };
        match account.mode {
            RiskMode::Finite => {
                if price.is_positive() {
                    account.cash.max(0) / price.as_i64()
                } else {
                    0
                }
            }
            RiskMode::Infinite { position_limit } => {
                (position_limit - account.position(ticker).abs() - account.reserved_bid(ticker))
                    .max(0)
            }
        }
    }

    /// How many units the user could still commit to asks.
    ///
    /// Finite mode: deliverable inventory net of existing ask reservations.
    /// Infinite mode: position-limit headroom net of ask reservations.
    pub fn available_ask_capacity(&self, user: &UserId, ticker: &Ticker) -> i64 {
        let Some(account) = self.accounts.get(user) else {
            return 0;
        };
        match account.mode {
            RiskMode::Finite => account.position(ticker) - account.reserved_ask(ticker),
            RiskMode::Infinite { position_limit } => {
                (position_limit - account.position(ticker).abs() - account.reserved_ask(ticker))
                    .max(0)
            }
        }
    }

    /// Unrealized PnL against the given mark prices.
    ///
    /// Floating point by design; advisory display data only.
    pub fn unrealized_pnl(&self, user: &UserId, marks: &HashMap<Ticker, Price>) -> f64 {
        let Some(account) = self.accounts.get(user) else {
            return 0.0;
        };
        account
            .positions
            .iter()
            .map(|(ticker, &position)| {
                let mark = marks.get(ticker).copied().unwrap_or(Price::MARKET);
                position as f64 * mark.as_i64() as f64 - account.cost_basis(ticker)
            })
            .sum()
    }

    /// All users ranked by unrealized PnL ascending, ties broken by username.
    pub fn leaderboard(&self, marks: &HashMap<Ticker, Price>) -> Vec<LeaderboardRow> {
        let mut rows: Vec<LeaderboardRow> = self
            .accounts
            .iter()
            .map(|(user, account)| LeaderboardRow {
                user: user.clone(),
                cash: account.cash(),
                pnl: self.unrealized_pnl(user, marks),
            })
            .collect();
        rows.sort_by(|a, b| {
            a.pnl
                .partial_cmp(&b.pnl)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.user.cmp(&b.user))
        });
        rows
    }

    /// Structured account details for the query API.
    pub fn account_report(&self, user: &UserId, open_orders: &[Order]) -> Option<AccountReport> {
        let account = self.accounts.get(user)?;
        let mut positions: Vec<PositionReport> = account
            .positions
            .iter()
            .map(|(ticker, &position)| PositionReport {
                ticker: ticker.clone(),
                position,
                average_cost: account.average_cost(ticker),
            })
            .collect();
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        let open_orders = open_orders
            .iter()
            .map(|order| OpenOrderReport {
                order_id: order.id,
                ticker: order.ticker.clone(),
                side: order.side,
                price: order.price,
                volume: order.volume.as_i64(),
            })
            .collect();

        Some(AccountReport {
            user: user.clone(),
            cash: account.cash(),
            positions,
            open_orders,
        })
    }
}

/// Shared reservation adjustment with an underflow guard.
fn adjust_reservation(slot: &mut i64, user: &UserId, ticker: &Ticker, delta: i64) {
    let next = *slot + delta;
    if next < 0 {
        warn!(user = %user, ticker = %ticker, current = *slot, delta, "reservation underflow clamped");
        *slot = 0;
    } else {
        *slot = next;
    }
}
