//! Sealed-bid auction helper
//!
//! Keeps only the best bid and its bidder. Settlement debits the winner's
//! cash through the ledger — a sink with no corresponding credit — and
//! resets the auction. All access runs through the execution serializer.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use types::ids::UserId;

use crate::ledger::Ledger;

/// Outcome of a settled auction round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub user: UserId,
    pub bid: i64,
    /// False when the debit was refused (winner could no longer pay).
    pub settled: bool,
}

/// Single-winner sealed-bid auction state. Not persisted.
#[derive(Debug, Clone)]
pub struct Auction {
    ceiling: i64,
    best_bid: i64,
    best_user: Option<UserId>,
}

impl Auction {
    pub fn new(ceiling: i64) -> Self {
        Self {
            ceiling,
            best_bid: 0,
            best_user: None,
        }
    }

    /// Whether a bid amount is admissible: positive and at most the ceiling.
    pub fn is_valid(&self, bid: i64) -> bool {
        bid > 0 && bid <= self.ceiling
    }

    /// Record a bid, keeping the maximum. Strictly-greater comparison: the
    /// first bidder to reach the maximum keeps it on ties.
    ///
    /// Returns true when the bid became the new best.
    pub fn place_bid(&mut self, user: &UserId, bid: i64) -> bool {
        if bid > self.best_bid {
            self.best_bid = bid;
            self.best_user = Some(user.clone());
            true
        } else {
            false
        }
    }

    /// Current best bid and bidder, if any.
    pub fn best(&self) -> Option<(&UserId, i64)> {
        self.best_user.as_ref().map(|user| (user, self.best_bid))
    }

    /// Debit the winning bidder through the ledger and reset the auction.
    ///
    /// Returns `None` when no bid was placed.
    pub fn settle(&mut self, ledger: &mut Ledger) -> Option<AuctionOutcome> {
        let user = self.best_user.take()?;
        let bid = self.best_bid;
        self.best_bid = 0;

        let settled = ledger.adjust_cash(&user, -bid);
        if settled {
            info!(user = %user, bid, "auction settled");
        } else {
            warn!(user = %user, bid, "auction debit refused; winner could not pay");
        }
        Some(AuctionOutcome { user, bid, settled })
    }
}
