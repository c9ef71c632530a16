//! Exchange core service
//!
//! Wires the matching engine, participant ledger, market-data sequencer,
//! and auction behind a single-writer executor task. Callers interact
//! through a cloneable [`ExchangeHandle`]; every command is serialized
//! through one FIFO channel, so no exchange state is ever shared between
//! threads.
//!
//! ```text
//! ExchangeHandle ──Command──▶ executor task
//!   (any task)                 ├── MatchingEngine (books + ledger)
//!                              ├── Sequencer (bounded replay log)
//!                              └── Auction
//! ```

pub mod command;
pub mod config;
pub mod executor;
pub mod handle;

pub use command::{Command, ReplayStatus};
pub use config::{ExchangeConfig, InstrumentConfig};
pub use executor::ExchangeCore;
pub use handle::ExchangeHandle;
