//! Matching engine
//!
//! Per-ticker limit order books with strict price-time priority. The
//! engine owns the participant ledger so admission, matching, and
//! settlement happen in one place, and it feeds every book mutation to
//! the market-data aggregator as an absolute-volume level change.
//!
//! Nothing in this crate is thread-safe by construction; exclusive
//! access comes from the single-writer executor that owns the engine.

pub mod book;
pub mod engine;

pub use book::Book;
pub use engine::{FillStatus, LimitFill, MarketFill, MatchingEngine};
