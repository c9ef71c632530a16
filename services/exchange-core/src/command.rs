//! Command protocol for the execution serializer
//!
//! Every mutation and query is a `Command` carrying a oneshot reply
//! channel. Commands are executed strictly in channel order by the one
//! task that owns the exchange state; callers only ever hold a sender.

use tokio::sync::oneshot;

use ledger::{AccountReport, AuctionOutcome, LeaderboardRow};
use market_data::{BookSnapshot, ReplayEntry};
use matching_engine::{LimitFill, MarketFill};
use types::errors::ExchangeResult;
use types::ids::{OrderId, Ticker, UserId};
use types::numeric::{Price, Volume};
use types::order::{Order, Side};

/// Reply to a replay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStatus {
    /// Every retained batch from the requested sequence onward, in order.
    Entries(Vec<ReplayEntry>),
    /// The requested sequence fell out of the retained window; the client
    /// must re-snapshot and resume from there.
    SnapshotRequired { min_retained: u64 },
}

#[derive(Debug)]
pub enum Command {
    InitUser {
        user: UserId,
        reply: oneshot::Sender<()>,
    },
    InitBot {
        user: UserId,
        reply: oneshot::Sender<()>,
    },
    LimitOrder {
        user: UserId,
        ticker: Ticker,
        side: Side,
        price: Price,
        volume: Volume,
        reply: oneshot::Sender<ExchangeResult<LimitFill>>,
    },
    MarketOrder {
        user: UserId,
        ticker: Ticker,
        side: Side,
        volume: Volume,
        reply: oneshot::Sender<ExchangeResult<MarketFill>>,
    },
    Cancel {
        user: UserId,
        order_id: OrderId,
        reply: oneshot::Sender<ExchangeResult<Volume>>,
    },
    CancelAll {
        user: UserId,
        reply: oneshot::Sender<Volume>,
    },
    SetPrices {
        prices: Vec<(Ticker, Price)>,
        reply: oneshot::Sender<ExchangeResult<()>>,
    },
    AuctionBid {
        user: UserId,
        bid: i64,
        reply: oneshot::Sender<ExchangeResult<bool>>,
    },
    AuctionSettle {
        reply: oneshot::Sender<Option<AuctionOutcome>>,
    },
    Snapshot {
        ticker: Ticker,
        reply: oneshot::Sender<ExchangeResult<BookSnapshot>>,
    },
    Replay {
        from_seq: u64,
        reply: oneshot::Sender<ReplayStatus>,
    },
    OpenOrders {
        user: UserId,
        reply: oneshot::Sender<Vec<Order>>,
    },
    AccountReport {
        user: UserId,
        reply: oneshot::Sender<Option<AccountReport>>,
    },
    Leaderboard {
        reply: oneshot::Sender<Vec<LeaderboardRow>>,
    },
    /// Oldest sequence still in the replay window, if any.
    MinRetainedSeq {
        reply: oneshot::Sender<Option<u64>>,
    },
    /// Force an immediate publish tick; replies with the assigned
    /// sequence, or `None` when nothing was pending.
    PublishNow {
        reply: oneshot::Sender<Option<u64>>,
    },
}
