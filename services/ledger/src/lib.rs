//! Participant ledger
//!
//! Tracks each participant's cash, signed inventory, resting-order
//! reservations, and advisory cost basis under one of two risk models:
//! cash-bounded (`Finite`) or position-limit-bounded (`Infinite`).
//! Also hosts the sealed-bid auction helper, which settles through the
//! same ledger.
//!
//! The ledger performs no synchronization of its own: every mutation runs
//! inside the single-writer execution serializer.

pub mod account;
pub mod auction;
pub mod ledger;

pub use account::{Account, RiskMode};
pub use auction::{Auction, AuctionOutcome};
pub use ledger::{
    AccountReport, LeaderboardRow, Ledger, LedgerDefaults, OpenOrderReport, PositionReport,
};
