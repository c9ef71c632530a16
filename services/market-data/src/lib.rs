//! Market data core
//!
//! Turns the matching engine's raw level changes into a replayable,
//! sequenced stream:
//!
//! - `aggregator`: deduplicates pending changes last-write-wins per
//!   (ticker, side, price) between publish ticks
//! - `sequencer`: assigns monotonic sequence numbers to published batches
//!   and retains a bounded recent window for client catch-up
//! - `snapshot`: full-book snapshots carrying the sequence to resume
//!   replay from
//!
//! ```text
//! MatchingEngine ──level changes──▶ ChangeAggregator
//!                                        │ drain (publish tick)
//!                                        ▼
//!                                    Sequencer ──▶ bounded replay log
//!                                        │
//!                                 broadcast layer (external)
//! ```

pub mod aggregator;
pub mod sequencer;
pub mod snapshot;

pub use aggregator::ChangeAggregator;
pub use sequencer::{ReplayEntry, Sequencer};
pub use snapshot::{BookSnapshot, SnapshotLevel};
