//! Startup configuration
//!
//! Plain data supplied by the embedding process; the core never reads
//! files or environment variables. The instrument universe is fixed for
//! the lifetime of the exchange.

use std::collections::HashMap;
use std::time::Duration;

use ledger::{LedgerDefaults, RiskMode};
use types::ids::Ticker;
use types::numeric::Price;

/// One tradable instrument and its starting mark price.
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    pub ticker: Ticker,
    pub mark_price: Price,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub instruments: Vec<InstrumentConfig>,
    /// Starting cash for each newly initialized account.
    pub starting_cash: i64,
    /// Starting inventory per ticker for each newly initialized account.
    pub starting_inventory: HashMap<Ticker, i64>,
    /// Risk model applied to non-bot accounts.
    pub risk_mode: RiskMode,
    /// Number of published change batches retained for replay.
    pub replay_capacity: usize,
    /// How often pending level changes are published.
    pub publish_interval: Duration,
    /// Maximum admissible sealed-bid auction bid.
    pub auction_ceiling: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            starting_cash: 100_000,
            starting_inventory: HashMap::new(),
            risk_mode: RiskMode::Finite,
            replay_capacity: 256,
            publish_interval: Duration::from_millis(250),
            auction_ceiling: 100_000,
        }
    }
}

impl ExchangeConfig {
    pub fn ledger_defaults(&self) -> LedgerDefaults {
        LedgerDefaults {
            cash: self.starting_cash,
            inventory: self.starting_inventory.clone(),
            mode: self.risk_mode,
        }
    }

    pub fn instruments(&self) -> impl Iterator<Item = (Ticker, Price)> + '_ {
        self.instruments
            .iter()
            .map(|i| (i.ticker.clone(), i.mark_price))
    }
}
