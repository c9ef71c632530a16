//! Price-time-priority matching over per-ticker books
//!
//! The engine owns every book plus the participant ledger, so one matching
//! pass can validate, trade, and settle without reaching outside itself.
//! All mutation happens on the executor task; nothing here is shared.
//!
//! Trades always execute at the resting order's price. Validation is
//! all-or-nothing: a rejected command leaves books, ledger, and pending
//! level changes untouched.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ledger::{Ledger, RiskMode};
use market_data::ChangeAggregator;
use types::errors::{ExchangeError, ExchangeResult};
use types::events::LevelChange;
use types::ids::{OrderId, Ticker, UserId};
use types::numeric::{notional, Price, Volume};
use types::order::{Order, Side};

use crate::book::{crosses, Book};

/// Result of a limit order submission.
///
/// `order_id` is [`OrderId::NONE`] when the order filled completely and
/// left nothing resting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitFill {
    pub order_id: OrderId,
    pub filled: Volume,
    /// Volume-weighted average execution price; 0.0 when nothing traded.
    pub avg_price: f64,
}

/// Whether a market order consumed its full requested volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStatus {
    Filled,
    Partial,
}

/// Result of a market order submission. Partial fills are a success
/// outcome; the unfilled remainder is discarded, never rested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFill {
    pub filled: Volume,
    pub avg_price: f64,
    pub status: FillStatus,
}

/// Location of a resting order, kept in a flat index so cancels never
/// scan the books.
#[derive(Debug, Clone)]
struct OrderRef {
    owner: UserId,
    ticker: Ticker,
    side: Side,
    price: Price,
}

/// Books, ledger, and order index for the whole exchange.
#[derive(Debug)]
pub struct MatchingEngine {
    books: HashMap<Ticker, Book>,
    ledger: Ledger,
    mark_prices: HashMap<Ticker, Price>,
    index: HashMap<OrderId, OrderRef>,
    by_user: HashMap<UserId, BTreeSet<OrderId>>,
    pending: ChangeAggregator,
    next_order_id: u64,
}

impl MatchingEngine {
    /// Create an engine over a fixed instrument universe with starting
    /// mark prices. Books are never created after startup.
    pub fn new(instruments: impl IntoIterator<Item = (Ticker, Price)>, ledger: Ledger) -> Self {
        let mut books = HashMap::new();
        let mut mark_prices = HashMap::new();
        for (ticker, price) in instruments {
            books.insert(ticker.clone(), Book::new());
            mark_prices.insert(ticker, price);
        }
        Self {
            books,
            ledger,
            mark_prices,
            index: HashMap::new(),
            by_user: HashMap::new(),
            pending: ChangeAggregator::new(),
            next_order_id: 1,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Instrument universe, sorted for deterministic iteration.
    pub fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = self.books.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub fn mark_price(&self, ticker: &Ticker) -> Option<Price> {
        self.mark_prices.get(ticker).copied()
    }

    pub fn mark_prices(&self) -> &HashMap<Ticker, Price> {
        &self.mark_prices
    }

    /// Submit a limit order: match whatever crosses, rest the remainder.
    pub fn limit_order(
        &mut self,
        user: &UserId,
        ticker: &Ticker,
        side: Side,
        price: Price,
        volume: Volume,
    ) -> ExchangeResult<LimitFill> {
        if self.books.is_empty() {
            return Err(ExchangeError::ServerMisconfigured);
        }
        if !volume.is_positive() {
            return Err(ExchangeError::InvalidVolume);
        }
        if !price.is_positive() {
            return Err(ExchangeError::InvalidPrice);
        }
        if !self.books.contains_key(ticker) {
            return Err(ExchangeError::unknown_ticker(ticker.as_str()));
        }
        if !self.ledger.contains(user) {
            return Err(ExchangeError::user_not_initialized(user.as_str()));
        }
        self.check_limit_admission(user, ticker, side, price, volume)?;

        let Some(book) = self.books.get_mut(ticker) else {
            return Err(ExchangeError::unknown_ticker(ticker.as_str()));
        };

        let mut remaining = volume;
        let mut filled = Volume::ZERO;
        let mut notional_sum: i64 = 0;

        while remaining.is_positive() {
            let Some(best) = book.opposite_best_price(side) else {
                break;
            };
            if !crosses(side, price, best) {
                break;
            }
            let Some((level_price, level)) = book.opposite_best_level_mut(side) else {
                break;
            };
            let Some(front) = level.front() else {
                break;
            };
            let resting_owner = front.owner.clone();
            let traded = remaining.min(front.volume);

            settle_trade(
                &mut self.ledger,
                user,
                &resting_owner,
                ticker,
                side,
                level_price,
                traded,
            );
            remaining -= traded;
            filled += traded;
            notional_sum += notional(level_price, traded);

            if let Some(done) = level.consume_front(traded) {
                retire_order(&mut self.index, &mut self.by_user, &done);
            }
            let level_total = level.total_volume();
            book.prune_opposite(side, level_price);
            self.pending.record(LevelChange::new(
                ticker.clone(),
                side.opposite(),
                level_price,
                level_total,
            ));
            debug!(
                user = %user,
                ticker = %ticker,
                price = %level_price,
                volume = %traded,
                "trade"
            );
        }

        let avg_price = vwap(notional_sum, filled);
        if remaining.is_zero() {
            return Ok(LimitFill {
                order_id: OrderId::NONE,
                filled,
                avg_price,
            });
        }

        let order_id = OrderId::new(self.next_order_id);
        self.next_order_id += 1;

        let order = Order::new(
            order_id,
            user.clone(),
            ticker.clone(),
            side,
            price,
            remaining,
        );
        book.insert(order);
        let level_total = book.level_volume(side, price);

        match side {
            Side::Bid => self.ledger.adjust_reserved_bid(user, ticker, remaining.as_i64()),
            Side::Ask => self.ledger.adjust_reserved_ask(user, ticker, remaining.as_i64()),
        }
        self.pending
            .record(LevelChange::new(ticker.clone(), side, price, level_total));
        self.index.insert(
            order_id,
            OrderRef {
                owner: user.clone(),
                ticker: ticker.clone(),
                side,
                price,
            },
        );
        self.by_user.entry(user.clone()).or_default().insert(order_id);
        debug!(
            user = %user,
            ticker = %ticker,
            order_id = %order_id,
            price = %price,
            volume = %remaining,
            "order resting"
        );

        Ok(LimitFill {
            order_id,
            filled,
            avg_price,
        })
    }

    /// Submit a market order: walk the opposite side until the requested
    /// volume, the book, or the user's capacity runs out. The remainder of
    /// a partial fill is discarded.
    pub fn market_order(
        &mut self,
        user: &UserId,
        ticker: &Ticker,
        side: Side,
        volume: Volume,
    ) -> ExchangeResult<MarketFill> {
        if self.books.is_empty() {
            return Err(ExchangeError::ServerMisconfigured);
        }
        if !volume.is_positive() {
            return Err(ExchangeError::InvalidVolume);
        }
        if !self.books.contains_key(ticker) {
            return Err(ExchangeError::unknown_ticker(ticker.as_str()));
        }
        if !self.ledger.contains(user) {
            return Err(ExchangeError::user_not_initialized(user.as_str()));
        }

        let is_bot = self.ledger.is_bot(user);
        if !is_bot {
            // Capacity checks that need no execution price run up front;
            // Finite-mode buyers are instead clamped level by level below.
            match (side, self.ledger.mode(user)) {
                (Side::Ask, Some(RiskMode::Finite)) => {
                    if self.ledger.available_ask_capacity(user, ticker) < volume.as_i64() {
                        return Err(ExchangeError::InsufficientTickerBalance);
                    }
                }
                (Side::Bid, Some(RiskMode::Infinite { .. })) => {
                    if self.ledger.available_bid_capacity(user, ticker, Price::MARKET)
                        < volume.as_i64()
                    {
                        return Err(ExchangeError::PositionLimitExceeded);
                    }
                }
                (Side::Ask, Some(RiskMode::Infinite { .. })) => {
                    if self.ledger.available_ask_capacity(user, ticker) < volume.as_i64() {
                        return Err(ExchangeError::PositionLimitExceeded);
                    }
                }
                _ => {}
            }
        }

        let Some(book) = self.books.get_mut(ticker) else {
            return Err(ExchangeError::unknown_ticker(ticker.as_str()));
        };
        if book.opposite_is_empty(side) {
            return Err(ExchangeError::NoLiquidity);
        }

        let mut remaining = volume;
        let mut filled = Volume::ZERO;
        let mut notional_sum: i64 = 0;

        while remaining.is_positive() {
            let Some((level_price, level)) = book.opposite_best_level_mut(side) else {
                break;
            };
            let Some(front) = level.front() else {
                break;
            };
            let resting_owner = front.owner.clone();
            let front_volume = front.volume;

            // Re-clamp against the live ledger at this level's price.
            let cap = if is_bot {
                remaining
            } else {
                let avail = match side {
                    Side::Bid => self.ledger.available_bid_capacity(user, ticker, level_price),
                    Side::Ask => self.ledger.available_ask_capacity(user, ticker),
                };
                remaining.min(Volume::new(avail.max(0)))
            };
            if cap.is_zero() {
                if filled.is_zero() {
                    return Err(match side {
                        Side::Bid => ExchangeError::InsufficientBalance,
                        Side::Ask => ExchangeError::InsufficientTickerBalance,
                    });
                }
                break;
            }
            let traded = cap.min(front_volume);

            settle_trade(
                &mut self.ledger,
                user,
                &resting_owner,
                ticker,
                side,
                level_price,
                traded,
            );
            remaining -= traded;
            filled += traded;
            notional_sum += notional(level_price, traded);

            if let Some(done) = level.consume_front(traded) {
                retire_order(&mut self.index, &mut self.by_user, &done);
            }
            let level_total = level.total_volume();
            book.prune_opposite(side, level_price);
            self.pending.record(LevelChange::new(
                ticker.clone(),
                side.opposite(),
                level_price,
                level_total,
            ));
            debug!(
                user = %user,
                ticker = %ticker,
                price = %level_price,
                volume = %traded,
                "trade"
            );
        }

        let status = if remaining.is_zero() {
            FillStatus::Filled
        } else {
            FillStatus::Partial
        };
        Ok(MarketFill {
            filled,
            avg_price: vwap(notional_sum, filled),
            status,
        })
    }

    /// Cancel one resting order, releasing its reservation.
    ///
    /// Returns the volume released. Only the owner may cancel.
    pub fn cancel(&mut self, user: &UserId, order_id: OrderId) -> ExchangeResult<Volume> {
        if order_id.is_none() {
            return Err(ExchangeError::InvalidOrderId);
        }
        match self.index.get(&order_id) {
            None => Err(ExchangeError::OrderNotFound {
                order_id: order_id.as_u64(),
            }),
            Some(entry) if entry.owner != *user => Err(ExchangeError::AuthenticationFailed),
            Some(_) => self.remove_resting(order_id),
        }
    }

    /// Cancel every resting order a user owns; returns the total volume
    /// released. Cancelling nothing is not an error.
    pub fn cancel_all(&mut self, user: &UserId) -> Volume {
        let ids: Vec<OrderId> = self
            .by_user
            .get(user)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let mut released = Volume::ZERO;
        for id in ids {
            if let Ok(volume) = self.remove_resting(id) {
                released += volume;
            }
        }
        released
    }

    /// Administrative mark price reset.
    ///
    /// Verifies every ticker up front so the reset is all-or-nothing, then
    /// per ticker: sets the mark price, clears the book (emitting a
    /// zero-volume change per vacated level), and zeroes reservations.
    pub fn set_prices(&mut self, prices: &[(Ticker, Price)]) -> ExchangeResult<()> {
        for (ticker, price) in prices {
            if !self.books.contains_key(ticker) {
                return Err(ExchangeError::unknown_ticker(ticker.as_str()));
            }
            if !price.is_positive() {
                return Err(ExchangeError::InvalidPrice);
            }
        }
        for (ticker, price) in prices {
            self.mark_prices.insert(ticker.clone(), *price);
            let Some(book) = self.books.get_mut(ticker) else {
                continue;
            };
            for (side, level_price, _volume) in book.clear() {
                self.pending.record(LevelChange::new(
                    ticker.clone(),
                    side,
                    level_price,
                    Volume::ZERO,
                ));
            }
            let by_user = &mut self.by_user;
            self.index.retain(|id, entry| {
                if entry.ticker == *ticker {
                    if let Some(ids) = by_user.get_mut(&entry.owner) {
                        ids.remove(id);
                    }
                    false
                } else {
                    true
                }
            });
            self.by_user.retain(|_, ids| !ids.is_empty());
            self.ledger.clear_reservations(ticker);
            info!(ticker = %ticker, price = %price, "mark price reset, book cleared");
        }
        Ok(())
    }

    /// All resting orders a user owns, ordered by order id.
    pub fn open_orders(&self, user: &UserId) -> Vec<Order> {
        let Some(ids) = self.by_user.get(user) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                let entry = self.index.get(id)?;
                let book = self.books.get(&entry.ticker)?;
                book.get_order(entry.side, entry.price, *id).cloned()
            })
            .collect()
    }

    /// Aggregated depth for one side of a book, best price first.
    pub fn depth(&self, ticker: &Ticker, side: Side) -> ExchangeResult<Vec<(Price, Volume)>> {
        self.books
            .get(ticker)
            .map(|book| book.depth(side))
            .ok_or_else(|| ExchangeError::unknown_ticker(ticker.as_str()))
    }

    pub fn best_bid(&self, ticker: &Ticker) -> ExchangeResult<Option<(Price, Volume)>> {
        self.books
            .get(ticker)
            .map(Book::best_bid)
            .ok_or_else(|| ExchangeError::unknown_ticker(ticker.as_str()))
    }

    pub fn best_ask(&self, ticker: &Ticker) -> ExchangeResult<Option<(Price, Volume)>> {
        self.books
            .get(ticker)
            .map(Book::best_ask)
            .ok_or_else(|| ExchangeError::unknown_ticker(ticker.as_str()))
    }

    /// Both sides of one book as aggregated (price, volume) levels,
    /// best price first. Snapshot source.
    pub fn book_levels(
        &self,
        ticker: &Ticker,
    ) -> ExchangeResult<(Vec<(Price, Volume)>, Vec<(Price, Volume)>)> {
        self.books
            .get(ticker)
            .map(|book| (book.depth(Side::Bid), book.depth(Side::Ask)))
            .ok_or_else(|| ExchangeError::unknown_ticker(ticker.as_str()))
    }

    /// Drain the level changes accumulated since the last publish tick.
    pub fn take_pending(&mut self) -> Vec<LevelChange> {
        self.pending.drain()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Capacity admission for the full limit order volume. Bots bypass.
    fn check_limit_admission(
        &self,
        user: &UserId,
        ticker: &Ticker,
        side: Side,
        price: Price,
        volume: Volume,
    ) -> ExchangeResult<()> {
        if self.ledger.is_bot(user) {
            return Ok(());
        }
        let Some(mode) = self.ledger.mode(user) else {
            return Err(ExchangeError::user_not_initialized(user.as_str()));
        };
        match (side, mode) {
            (Side::Bid, RiskMode::Finite) => {
                if self.ledger.balance(user).unwrap_or(0) < notional(price, volume) {
                    return Err(ExchangeError::InsufficientBalance);
                }
            }
            (Side::Ask, RiskMode::Finite) => {
                if self.ledger.available_ask_capacity(user, ticker) < volume.as_i64() {
                    return Err(ExchangeError::InsufficientTickerBalance);
                }
            }
            (Side::Bid, RiskMode::Infinite { .. }) => {
                if self.ledger.available_bid_capacity(user, ticker, price) < volume.as_i64() {
                    return Err(ExchangeError::PositionLimitExceeded);
                }
            }
            (Side::Ask, RiskMode::Infinite { .. }) => {
                if self.ledger.available_ask_capacity(user, ticker) < volume.as_i64() {
                    return Err(ExchangeError::PositionLimitExceeded);
                }
            }
        }
        Ok(())
    }

    /// Remove a resting order by id, release its reservation, and record
    /// the level change. The index entry must exist.
    fn remove_resting(&mut self, order_id: OrderId) -> ExchangeResult<Volume> {
        let Some(entry) = self.index.remove(&order_id) else {
            return Err(ExchangeError::OrderNotFound {
                order_id: order_id.as_u64(),
            });
        };
        if let Some(ids) = self.by_user.get_mut(&entry.owner) {
            ids.remove(&order_id);
            if ids.is_empty() {
                self.by_user.remove(&entry.owner);
            }
        }
        let Some(book) = self.books.get_mut(&entry.ticker) else {
            return Err(ExchangeError::internal("book missing for indexed order"));
        };
        let Some(mut order) = book.remove(entry.side, entry.price, order_id) else {
            return Err(ExchangeError::internal("indexed order missing from book"));
        };
        order.cancel();
        let released = order.volume;

        match entry.side {
            Side::Bid => {
                self.ledger
                    .adjust_reserved_bid(&entry.owner, &entry.ticker, -released.as_i64())
            }
            Side::Ask => {
                self.ledger
                    .adjust_reserved_ask(&entry.owner, &entry.ticker, -released.as_i64())
            }
        }
        let level_total = book.level_volume(entry.side, entry.price);
        self.pending.record(LevelChange::new(
            entry.ticker.clone(),
            entry.side,
            entry.price,
            level_total,
        ));
        debug!(order_id = %order_id, user = %entry.owner, "order cancelled");
        Ok(released)
    }
}

/// Settle one trade at the resting price: move cash buyer to seller,
/// apply position deltas, and release the resting owner's reservation.
fn settle_trade(
    ledger: &mut Ledger,
    aggressor: &UserId,
    resting_owner: &UserId,
    ticker: &Ticker,
    aggressor_side: Side,
    price: Price,
    traded: Volume,
) {
    let (buyer, seller) = match aggressor_side {
        Side::Bid => (aggressor, resting_owner),
        Side::Ask => (resting_owner, aggressor),
    };
    ledger.transfer(buyer, seller, notional(price, traded));
    ledger.adjust_position(buyer, ticker, traded.as_i64(), price);
    ledger.adjust_position(seller, ticker, -traded.as_i64(), price);
    match aggressor_side {
        Side::Bid => ledger.adjust_reserved_ask(resting_owner, ticker, -traded.as_i64()),
        Side::Ask => ledger.adjust_reserved_bid(resting_owner, ticker, -traded.as_i64()),
    }
}

/// Drop a fully filled order from the cancel index.
fn retire_order(
    index: &mut HashMap<OrderId, OrderRef>,
    by_user: &mut HashMap<UserId, BTreeSet<OrderId>>,
    done: &Order,
) {
    index.remove(&done.id);
    if let Some(ids) = by_user.get_mut(&done.owner) {
        ids.remove(&done.id);
        if ids.is_empty() {
            by_user.remove(&done.owner);
        }
    }
}

fn vwap(notional_sum: i64, filled: Volume) -> f64 {
    if filled.is_positive() {
        notional_sum as f64 / filled.as_i64() as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::LedgerDefaults;
    use proptest::prelude::*;

    fn acme() -> Ticker {
        Ticker::new("ACME")
    }

    fn uid(name: &str) -> UserId {
        UserId::new(name)
    }

    fn engine_with(defaults: LedgerDefaults, users: &[&str]) -> MatchingEngine {
        let mut engine =
            MatchingEngine::new([(acme(), Price::new(100))], Ledger::new(defaults));
        for name in users {
            engine.ledger_mut().init_user(&uid(name));
        }
        engine
    }

    fn finite_engine(cash: i64, users: &[&str]) -> MatchingEngine {
        engine_with(
            LedgerDefaults {
                cash,
                inventory: HashMap::new(),
                mode: RiskMode::Finite,
            },
            users,
        )
    }

    fn finite_engine_with_inventory(cash: i64, qty: i64, users: &[&str]) -> MatchingEngine {
        let mut inventory = HashMap::new();
        inventory.insert(acme(), qty);
        engine_with(
            LedgerDefaults {
                cash,
                inventory,
                mode: RiskMode::Finite,
            },
            users,
        )
    }

    fn infinite_engine(limit: i64, users: &[&str]) -> MatchingEngine {
        engine_with(
            LedgerDefaults {
                cash: 0,
                inventory: HashMap::new(),
                mode: RiskMode::Infinite {
                    position_limit: limit,
                },
            },
            users,
        )
    }

    #[test]
    fn test_validation_order() {
        let mut empty = MatchingEngine::new([], Ledger::default());
        assert_eq!(
            empty.limit_order(&uid("a"), &acme(), Side::Bid, Price::new(1), Volume::new(1)),
            Err(ExchangeError::ServerMisconfigured)
        );

        let mut engine = finite_engine(1_000, &["alice"]);
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(1), Volume::ZERO),
            Err(ExchangeError::InvalidVolume)
        );
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::MARKET, Volume::new(1)),
            Err(ExchangeError::InvalidPrice)
        );
        assert!(matches!(
            engine.limit_order(&uid("alice"), &Ticker::new("NOPE"), Side::Bid, Price::new(1), Volume::new(1)),
            Err(ExchangeError::UnknownTicker { .. })
        ));
        assert!(matches!(
            engine.limit_order(&uid("ghost"), &acme(), Side::Bid, Price::new(1), Volume::new(1)),
            Err(ExchangeError::UserNotInitialized { .. })
        ));
        // Nothing leaked into the book or the change stream.
        assert!(engine.depth(&acme(), Side::Bid).unwrap().is_empty());
        assert!(!engine.has_pending());
    }

    #[test]
    fn test_uncrossed_limit_rests() {
        let mut engine = finite_engine(1_000, &["alice"]);
        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(5))
            .unwrap();

        assert_eq!(fill.order_id, OrderId::new(1));
        assert_eq!(fill.filled, Volume::ZERO);
        assert_eq!(fill.avg_price, 0.0);
        assert_eq!(
            engine.depth(&acme(), Side::Bid).unwrap(),
            vec![(Price::new(100), Volume::new(5))]
        );
        assert_eq!(engine.open_orders(&uid("alice")).len(), 1);
    }

    #[test]
    fn test_price_time_priority_and_vwap() {
        let mut engine = infinite_engine(10_000, &["alice", "bob", "carol", "dave"]);
        engine
            .limit_order(&uid("bob"), &acme(), Side::Ask, Price::new(101), Volume::new(5))
            .unwrap();
        engine
            .limit_order(&uid("carol"), &acme(), Side::Ask, Price::new(101), Volume::new(5))
            .unwrap();
        let dave_order = engine
            .limit_order(&uid("dave"), &acme(), Side::Ask, Price::new(102), Volume::new(5))
            .unwrap();

        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(102), Volume::new(12))
            .unwrap();

        // Best price first, FIFO within 101, then 2 units at 102.
        assert_eq!(fill.filled, Volume::new(12));
        assert_eq!(fill.order_id, OrderId::NONE);
        let expected = (5 * 101 + 5 * 101 + 2 * 102) as f64 / 12.0;
        assert!((fill.avg_price - expected).abs() < 1e-9);

        assert_eq!(engine.ledger().position(&uid("bob"), &acme()), -5);
        assert_eq!(engine.ledger().position(&uid("carol"), &acme()), -5);
        assert_eq!(engine.ledger().position(&uid("dave"), &acme()), -2);
        assert_eq!(engine.ledger().position(&uid("alice"), &acme()), 12);

        // Dave's order survives with the remainder at the front.
        let open = engine.open_orders(&uid("dave"));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, dave_order.order_id);
        assert_eq!(open[0].volume, Volume::new(3));
    }

    #[test]
    fn test_trade_executes_at_resting_price() {
        let mut engine = finite_engine_with_inventory(1_000, 100, &["alice", "bob"]);
        engine
            .limit_order(&uid("bob"), &acme(), Side::Ask, Price::new(101), Volume::new(10))
            .unwrap();

        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(105), Volume::new(4))
            .unwrap();

        assert_eq!(fill.filled, Volume::new(4));
        assert_eq!(fill.avg_price, 101.0);
        assert_eq!(engine.ledger().balance(&uid("alice")), Some(1_000 - 404));
        assert_eq!(engine.ledger().balance(&uid("bob")), Some(1_000 + 404));
        assert_eq!(engine.ledger().position(&uid("bob"), &acme()), 96);
    }

    #[test]
    fn test_finite_admission_rejections() {
        let mut engine = finite_engine(100, &["alice"]);
        // 2 * 100 = 200 > 100 cash.
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(2)),
            Err(ExchangeError::InsufficientBalance)
        );
        // No inventory to deliver.
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Ask, Price::new(100), Volume::new(1)),
            Err(ExchangeError::InsufficientTickerBalance)
        );
        assert!(engine.depth(&acme(), Side::Bid).unwrap().is_empty());
        assert!(engine.depth(&acme(), Side::Ask).unwrap().is_empty());
        assert!(!engine.has_pending());
    }

    #[test]
    fn test_infinite_limit_counts_reservations() {
        let mut engine = infinite_engine(10, &["alice"]);
        engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(6))
            .unwrap();

        // 6 already reserved out of a limit of 10.
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(5)),
            Err(ExchangeError::PositionLimitExceeded)
        );
        assert!(engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(4))
            .is_ok());
    }

    #[test]
    fn test_position_limit_rejects_oversized_order() {
        let mut engine = infinite_engine(100, &["alice"]);
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(1_000)),
            Err(ExchangeError::PositionLimitExceeded)
        );
        assert!(engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(100))
            .is_ok());
    }

    #[test]
    fn test_bots_bypass_capacity_checks() {
        let mut engine = finite_engine(0, &[]);
        let bot = uid("mm-bot");
        engine.ledger_mut().init_bot(&bot);

        let fill = engine
            .limit_order(&bot, &acme(), Side::Ask, Price::new(100), Volume::new(50))
            .unwrap();
        assert_eq!(fill.order_id, OrderId::new(1));
        assert_eq!(
            engine.depth(&acme(), Side::Ask).unwrap(),
            vec![(Price::new(100), Volume::new(50))]
        );
    }

    #[test]
    fn test_market_order_no_liquidity() {
        let mut engine = infinite_engine(100, &["alice"]);
        assert_eq!(
            engine.market_order(&uid("alice"), &acme(), Side::Bid, Volume::new(1)),
            Err(ExchangeError::NoLiquidity)
        );
    }

    #[test]
    fn test_market_order_partial_remainder_discarded() {
        let mut engine = infinite_engine(1_000, &["alice", "bob"]);
        engine
            .limit_order(&uid("bob"), &acme(), Side::Ask, Price::new(100), Volume::new(5))
            .unwrap();

        let fill = engine
            .market_order(&uid("alice"), &acme(), Side::Bid, Volume::new(8))
            .unwrap();

        assert_eq!(fill.filled, Volume::new(5));
        assert_eq!(fill.status, FillStatus::Partial);
        // Nothing rested: both sides empty, next order id unaffected.
        assert!(engine.depth(&acme(), Side::Bid).unwrap().is_empty());
        assert!(engine.depth(&acme(), Side::Ask).unwrap().is_empty());
    }

    #[test]
    fn test_market_buy_clamped_by_cash_per_level() {
        let mut engine = finite_engine_with_inventory(250, 100, &["alice", "bob"]);
        engine
            .limit_order(&uid("bob"), &acme(), Side::Ask, Price::new(100), Volume::new(10))
            .unwrap();

        // 250 cash buys 2 units at 100; the third is unaffordable.
        let fill = engine
            .market_order(&uid("alice"), &acme(), Side::Bid, Volume::new(10))
            .unwrap();
        assert_eq!(fill.filled, Volume::new(2));
        assert_eq!(fill.status, FillStatus::Partial);
        assert_eq!(engine.ledger().balance(&uid("alice")), Some(50));

        // A buyer who cannot afford a single unit is rejected outright.
        assert_eq!(
            engine.market_order(&uid("alice"), &acme(), Side::Bid, Volume::new(1)),
            Err(ExchangeError::InsufficientBalance)
        );
    }

    #[test]
    fn test_market_sell_capacity_checked_up_front() {
        let mut engine = finite_engine_with_inventory(1_000, 3, &["alice", "bob"]);
        engine
            .limit_order(&uid("bob"), &acme(), Side::Bid, Price::new(100), Volume::new(10))
            .unwrap();

        // The full requested volume must be deliverable before any fill.
        assert_eq!(
            engine.market_order(&uid("alice"), &acme(), Side::Ask, Volume::new(5)),
            Err(ExchangeError::InsufficientTickerBalance)
        );
        assert_eq!(engine.ledger().position(&uid("alice"), &acme()), 3);

        let fill = engine
            .market_order(&uid("alice"), &acme(), Side::Ask, Volume::new(3))
            .unwrap();
        assert_eq!(fill.filled, Volume::new(3));
        assert_eq!(fill.status, FillStatus::Filled);
        assert_eq!(engine.ledger().position(&uid("alice"), &acme()), 0);
    }

    #[test]
    fn test_position_limit_with_resting_bid() {
        let mut engine = infinite_engine(1_000, &["u1", "u2"]);
        engine
            .limit_order(&uid("u1"), &acme(), Side::Bid, Price::new(100), Volume::new(1_000))
            .unwrap();

        // u2 cannot commit to selling more than the limit allows.
        assert_eq!(
            engine.market_order(&uid("u2"), &acme(), Side::Ask, Volume::new(1_001)),
            Err(ExchangeError::PositionLimitExceeded)
        );
        assert_eq!(engine.ledger().position(&uid("u2"), &acme()), 0);

        let fill = engine
            .market_order(&uid("u2"), &acme(), Side::Ask, Volume::new(999))
            .unwrap();
        assert_eq!(fill.filled, Volume::new(999));
        assert_eq!(fill.status, FillStatus::Filled);
        assert_eq!(engine.ledger().position(&uid("u1"), &acme()), 999);
        assert_eq!(engine.ledger().position(&uid("u2"), &acme()), -999);
        assert_eq!(engine.ledger().balance(&uid("u2")), Some(99_900));
        assert_eq!(engine.ledger().balance(&uid("u1")), Some(-99_900));
        // u1's resting bid keeps its last unit.
        assert_eq!(
            engine.depth(&acme(), Side::Bid).unwrap(),
            vec![(Price::new(100), Volume::new(1))]
        );
    }

    #[test]
    fn test_cancel_errors() {
        let mut engine = finite_engine(1_000, &["alice", "mallory"]);
        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(5))
            .unwrap();

        assert_eq!(
            engine.cancel(&uid("alice"), OrderId::NONE),
            Err(ExchangeError::InvalidOrderId)
        );
        assert_eq!(
            engine.cancel(&uid("alice"), OrderId::new(999)),
            Err(ExchangeError::OrderNotFound { order_id: 999 })
        );
        assert_eq!(
            engine.cancel(&uid("mallory"), fill.order_id),
            Err(ExchangeError::AuthenticationFailed)
        );

        let released = engine.cancel(&uid("alice"), fill.order_id).unwrap();
        assert_eq!(released, Volume::new(5));
        assert!(engine.depth(&acme(), Side::Bid).unwrap().is_empty());
        // Double cancel: the order is gone.
        assert_eq!(
            engine.cancel(&uid("alice"), fill.order_id),
            Err(ExchangeError::OrderNotFound { order_id: 1 })
        );
    }

    #[test]
    fn test_cancel_releases_reservation() {
        let mut engine = infinite_engine(10, &["alice"]);
        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(10))
            .unwrap();
        assert_eq!(
            engine.limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(1)),
            Err(ExchangeError::PositionLimitExceeded)
        );

        engine.cancel(&uid("alice"), fill.order_id).unwrap();
        assert!(engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(10))
            .is_ok());
    }

    #[test]
    fn test_cancel_all() {
        let mut engine = infinite_engine(100, &["alice", "bob"]);
        engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(99), Volume::new(5))
            .unwrap();
        engine
            .limit_order(&uid("alice"), &acme(), Side::Ask, Price::new(101), Volume::new(7))
            .unwrap();
        engine
            .limit_order(&uid("bob"), &acme(), Side::Bid, Price::new(98), Volume::new(3))
            .unwrap();

        assert_eq!(engine.cancel_all(&uid("alice")), Volume::new(12));
        assert!(engine.open_orders(&uid("alice")).is_empty());
        // Bob's order is untouched.
        assert_eq!(engine.open_orders(&uid("bob")).len(), 1);
        // Cancelling with nothing resting is a no-op, not an error.
        assert_eq!(engine.cancel_all(&uid("alice")), Volume::ZERO);
    }

    #[test]
    fn test_set_prices_resets_book() {
        let mut engine = infinite_engine(100, &["alice", "bob"]);
        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(99), Volume::new(5))
            .unwrap();
        engine
            .limit_order(&uid("bob"), &acme(), Side::Ask, Price::new(101), Volume::new(3))
            .unwrap();
        engine.take_pending();

        engine.set_prices(&[(acme(), Price::new(150))]).unwrap();

        assert_eq!(engine.mark_price(&acme()), Some(Price::new(150)));
        assert!(engine.depth(&acme(), Side::Bid).unwrap().is_empty());
        assert!(engine.depth(&acme(), Side::Ask).unwrap().is_empty());
        assert!(engine.open_orders(&uid("alice")).is_empty());
        assert_eq!(
            engine.cancel(&uid("alice"), fill.order_id),
            Err(ExchangeError::OrderNotFound { order_id: 1 })
        );
        // Reservations were zeroed, so the full limit is available again.
        assert!(engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(150), Volume::new(100))
            .is_ok());

        // Each vacated level was published as a removal.
        let changes = engine.take_pending();
        assert!(changes
            .iter()
            .any(|c| c.price == Price::new(99) && c.is_removal()));
        assert!(changes
            .iter()
            .any(|c| c.price == Price::new(101) && c.is_removal()));
    }

    #[test]
    fn test_set_prices_unknown_ticker_is_atomic() {
        let mut engine = infinite_engine(100, &["alice"]);
        engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(99), Volume::new(5))
            .unwrap();

        let result = engine.set_prices(&[(acme(), Price::new(150)), (Ticker::new("NOPE"), Price::new(1))]);
        assert!(matches!(result, Err(ExchangeError::UnknownTicker { .. })));
        // Nothing was applied.
        assert_eq!(engine.mark_price(&acme()), Some(Price::new(100)));
        assert_eq!(engine.depth(&acme(), Side::Bid).unwrap().len(), 1);
    }

    #[test]
    fn test_pending_changes_aggregate_per_level() {
        let mut engine = infinite_engine(1_000, &["alice", "bob"]);
        engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(5))
            .unwrap();
        engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(3))
            .unwrap();
        engine
            .market_order(&uid("bob"), &acme(), Side::Ask, Volume::new(6))
            .unwrap();

        // Three touches of the same level collapse into one final state.
        let changes = engine.take_pending();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].volume, Volume::new(2));
        assert!(!engine.has_pending());
    }

    #[test]
    fn test_self_trade_nets_flat() {
        let mut engine = infinite_engine(100, &["alice"]);
        engine
            .limit_order(&uid("alice"), &acme(), Side::Ask, Price::new(100), Volume::new(5))
            .unwrap();
        let fill = engine
            .limit_order(&uid("alice"), &acme(), Side::Bid, Price::new(100), Volume::new(5))
            .unwrap();

        assert_eq!(fill.filled, Volume::new(5));
        assert_eq!(engine.ledger().position(&uid("alice"), &acme()), 0);
        assert_eq!(engine.ledger().balance(&uid("alice")), Some(0));
        assert!(engine.depth(&acme(), Side::Ask).unwrap().is_empty());
    }

    proptest! {
        /// Random crossing flow between two users conserves cash and nets
        /// positions to zero.
        #[test]
        fn prop_matching_conserves_cash_and_inventory(
            orders in proptest::collection::vec(
                (0u8..2, 95i64..105, 1i64..20),
                1..60,
            ),
        ) {
            let mut engine = infinite_engine(1_000_000, &["a", "b"]);
            for (i, (side, price, volume)) in orders.into_iter().enumerate() {
                let user = if i % 2 == 0 { uid("a") } else { uid("b") };
                let side = if side == 0 { Side::Bid } else { Side::Ask };
                let _ = engine.limit_order(
                    &user,
                    &acme(),
                    side,
                    Price::new(price),
                    Volume::new(volume),
                );
            }

            let cash_total = engine.ledger().balance(&uid("a")).unwrap_or(0)
                + engine.ledger().balance(&uid("b")).unwrap_or(0);
            prop_assert_eq!(cash_total, 0);

            let net = engine.ledger().position(&uid("a"), &acme())
                + engine.ledger().position(&uid("b"), &acme());
            prop_assert_eq!(net, 0);
        }
    }
}
