//! Async client handle for the execution serializer
//!
//! Thin, cloneable wrapper over the command channel. Each call enqueues
//! one command with a oneshot reply and awaits the result; a closed
//! channel (executor stopped) surfaces as an internal error rather than
//! a panic.

use tokio::sync::{mpsc, oneshot};

use ledger::{AccountReport, AuctionOutcome, LeaderboardRow};
use market_data::BookSnapshot;
use matching_engine::{LimitFill, MarketFill};
use types::errors::{ExchangeError, ExchangeResult};
use types::ids::{OrderId, Ticker, UserId};
use types::numeric::{Price, Volume};
use types::order::{Order, Side};

use crate::command::{Command, ReplayStatus};

#[derive(Debug, Clone)]
pub struct ExchangeHandle {
    tx: mpsc::UnboundedSender<Command>,
}

fn executor_gone() -> ExchangeError {
    ExchangeError::internal("exchange executor unavailable")
}

impl ExchangeHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    fn send(&self, command: Command) -> ExchangeResult<()> {
        self.tx.send(command).map_err(|_| executor_gone())
    }

    pub async fn init_user(&self, user: UserId) -> ExchangeResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InitUser { user, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    pub async fn init_bot(&self, user: UserId) -> ExchangeResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InitBot { user, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    pub async fn limit_order(
        &self,
        user: UserId,
        ticker: Ticker,
        side: Side,
        price: Price,
        volume: Volume,
    ) -> ExchangeResult<LimitFill> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::LimitOrder {
            user,
            ticker,
            side,
            price,
            volume,
            reply,
        })?;
        rx.await.map_err(|_| executor_gone())?
    }

    pub async fn market_order(
        &self,
        user: UserId,
        ticker: Ticker,
        side: Side,
        volume: Volume,
    ) -> ExchangeResult<MarketFill> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MarketOrder {
            user,
            ticker,
            side,
            volume,
            reply,
        })?;
        rx.await.map_err(|_| executor_gone())?
    }

    /// Cancel one resting order; resolves to the volume released.
    pub async fn cancel(&self, user: UserId, order_id: OrderId) -> ExchangeResult<Volume> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Cancel {
            user,
            order_id,
            reply,
        })?;
        rx.await.map_err(|_| executor_gone())?
    }

    /// Cancel every resting order the user owns; resolves to the total
    /// volume released.
    pub async fn cancel_all(&self, user: UserId) -> ExchangeResult<Volume> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CancelAll { user, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    /// Administrative mark price reset; clears the affected books.
    pub async fn set_prices(&self, prices: Vec<(Ticker, Price)>) -> ExchangeResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetPrices { prices, reply })?;
        rx.await.map_err(|_| executor_gone())?
    }

    /// Place a sealed auction bid; resolves to whether it became the best.
    pub async fn auction_bid(&self, user: UserId, bid: i64) -> ExchangeResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AuctionBid { user, bid, reply })?;
        rx.await.map_err(|_| executor_gone())?
    }

    /// Settle the auction round; `None` when no bid was placed.
    pub async fn auction_settle(&self) -> ExchangeResult<Option<AuctionOutcome>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AuctionSettle { reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    /// Full-book snapshot carrying the sequence to resume replay from.
    pub async fn snapshot(&self, ticker: Ticker) -> ExchangeResult<BookSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { ticker, reply })?;
        rx.await.map_err(|_| executor_gone())?
    }

    /// Retained change batches from `from_seq` onward, or a re-snapshot
    /// instruction when the window no longer reaches back that far.
    pub async fn replay(&self, from_seq: u64) -> ExchangeResult<ReplayStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Replay { from_seq, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    pub async fn open_orders(&self, user: UserId) -> ExchangeResult<Vec<Order>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::OpenOrders { user, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    pub async fn account_report(&self, user: UserId) -> ExchangeResult<Option<AccountReport>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AccountReport { user, reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    pub async fn leaderboard(&self) -> ExchangeResult<Vec<LeaderboardRow>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Leaderboard { reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    /// Render one book snapshot as an opaque JSON document.
    pub async fn serialize_book(&self, ticker: Ticker) -> ExchangeResult<String> {
        let snapshot = self.snapshot(ticker).await?;
        snapshot
            .to_json()
            .map_err(|e| ExchangeError::internal(e.to_string()))
    }

    /// Oldest sequence still in the replay window.
    pub async fn min_retained_seq(&self) -> ExchangeResult<Option<u64>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MinRetainedSeq { reply })?;
        rx.await.map_err(|_| executor_gone())
    }

    /// Force an immediate publish tick (tests and administrative tooling).
    pub async fn publish_now(&self) -> ExchangeResult<Option<u64>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::PublishNow { reply })?;
        rx.await.map_err(|_| executor_gone())
    }
}
