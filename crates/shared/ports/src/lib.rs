//! Coinvault Ports
//!
//! Port definitions (traits) for the collaborators the ledger core depends on.
//! These define the boundaries between domain logic and infrastructure.

mod clock;
mod error;
mod market_data;
mod settlement;

pub use clock::Clock;
pub use error::{MarketDataError, MarketDataResult, SettlementError, SettlementResult};
pub use market_data::{MarketDataProvider, PriceQuote};
pub use settlement::SettlementProvider;
