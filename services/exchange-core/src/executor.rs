//! The execution serializer
//!
//! One task owns the matching engine, the sequencer, and the auction;
//! exclusive access is enforced by ownership, not by locks. Commands
//! arrive over an unbounded FIFO channel and are executed strictly in
//! arrival order, interleaved with periodic publish ticks.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use ledger::{Auction, Ledger};
use market_data::{BookSnapshot, Sequencer};
use matching_engine::MatchingEngine;
use types::errors::ExchangeError;

use crate::command::{Command, ReplayStatus};
use crate::config::ExchangeConfig;
use crate::handle::ExchangeHandle;

/// All exchange state, owned exclusively by the executor task.
pub struct ExchangeCore {
    engine: MatchingEngine,
    sequencer: Sequencer,
    auction: Auction,
}

impl ExchangeCore {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            engine: MatchingEngine::new(
                config.instruments(),
                Ledger::new(config.ledger_defaults()),
            ),
            sequencer: Sequencer::new(config.replay_capacity),
            auction: Auction::new(config.auction_ceiling),
        }
    }

    /// Start the executor task and return a cloneable command handle.
    ///
    /// The task runs until every handle is dropped, flushing one final
    /// publish on shutdown.
    pub fn spawn(config: ExchangeConfig) -> ExchangeHandle {
        let core = Self::new(&config);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(core, rx, config));
        ExchangeHandle::new(tx)
    }

    /// Drain pending level changes into the sequencer.
    ///
    /// Returns the assigned sequence, or `None` when nothing was pending;
    /// empty batches never consume a sequence number.
    fn publish(&mut self) -> Option<u64> {
        let changes = self.engine.take_pending();
        if changes.is_empty() {
            return None;
        }
        let seq = self.sequencer.publish(changes);
        debug!(seq, "level changes published");
        Some(seq)
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::InitUser { user, reply } => {
                self.engine.ledger_mut().init_user(&user);
                let _ = reply.send(());
            }
            Command::InitBot { user, reply } => {
                self.engine.ledger_mut().init_bot(&user);
                let _ = reply.send(());
            }
            Command::LimitOrder {
                user,
                ticker,
                side,
                price,
                volume,
                reply,
            } => {
                let _ = reply.send(self.engine.limit_order(&user, &ticker, side, price, volume));
            }
            Command::MarketOrder {
                user,
                ticker,
                side,
                volume,
                reply,
            } => {
                let _ = reply.send(self.engine.market_order(&user, &ticker, side, volume));
            }
            Command::Cancel {
                user,
                order_id,
                reply,
            } => {
                let _ = reply.send(self.engine.cancel(&user, order_id));
            }
            Command::CancelAll { user, reply } => {
                let _ = reply.send(self.engine.cancel_all(&user));
            }
            Command::SetPrices { prices, reply } => {
                let _ = reply.send(self.engine.set_prices(&prices));
            }
            Command::AuctionBid { user, bid, reply } => {
                let result = if !self.engine.ledger().contains(&user) {
                    Err(ExchangeError::user_not_initialized(user.as_str()))
                } else if !self.auction.is_valid(bid) {
                    Err(ExchangeError::InvalidPrice)
                } else {
                    Ok(self.auction.place_bid(&user, bid))
                };
                let _ = reply.send(result);
            }
            Command::AuctionSettle { reply } => {
                let _ = reply.send(self.auction.settle(self.engine.ledger_mut()));
            }
            Command::Snapshot { ticker, reply } => {
                // Flush first so the snapshot's sequence covers every
                // change already folded into the book.
                self.publish();
                let seq = self.sequencer.last_seq().unwrap_or(0);
                let result = self
                    .engine
                    .book_levels(&ticker)
                    .map(|(bids, asks)| BookSnapshot::new(ticker.clone(), seq, bids, asks));
                let _ = reply.send(result);
            }
            Command::Replay { from_seq, reply } => {
                let from_seq = from_seq.max(1);
                let status = match self.sequencer.min_retained_seq() {
                    Some(min) if from_seq < min => {
                        ReplayStatus::SnapshotRequired { min_retained: min }
                    }
                    _ => {
                        let last = self.sequencer.last_seq().unwrap_or(0);
                        let entries = (from_seq..=last)
                            .filter_map(|seq| self.sequencer.get(seq).cloned())
                            .collect();
                        ReplayStatus::Entries(entries)
                    }
                };
                let _ = reply.send(status);
            }
            Command::OpenOrders { user, reply } => {
                let _ = reply.send(self.engine.open_orders(&user));
            }
            Command::AccountReport { user, reply } => {
                let open_orders = self.engine.open_orders(&user);
                let _ = reply.send(self.engine.ledger().account_report(&user, &open_orders));
            }
            Command::Leaderboard { reply } => {
                let _ = reply.send(self.engine.ledger().leaderboard(self.engine.mark_prices()));
            }
            Command::MinRetainedSeq { reply } => {
                let _ = reply.send(self.sequencer.min_retained_seq());
            }
            Command::PublishNow { reply } => {
                let _ = reply.send(self.publish());
            }
        }
    }
}

/// Executor loop: commands strictly in arrival order, publish ticks in
/// between. Exits when the last handle is dropped.
async fn run(
    mut core: ExchangeCore,
    mut rx: mpsc::UnboundedReceiver<Command>,
    config: ExchangeConfig,
) {
    info!(
        instruments = config.instruments.len(),
        replay_capacity = config.replay_capacity,
        "exchange executor started"
    );
    let mut tick = tokio::time::interval(config.publish_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => core.handle(command),
                None => break,
            },
            _ = tick.tick() => {
                core.publish();
            }
        }
    }
    core.publish();
    info!("exchange executor stopped");
}
