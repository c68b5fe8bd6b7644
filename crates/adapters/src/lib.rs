//! Coinvault Adapters
//!
//! Concrete implementations of the market-data and settlement ports.
//!
//! - [`FixturePriceFeed`]: documented fixture prices, for tests and offline runs
//! - [`CoinGeckoPriceFeed`]: live USD prices from the CoinGecko REST API
//! - [`SimulatedSettlement`]: accepts transfers locally, with injectable failures

pub mod market_data;
pub mod settlement;

pub use market_data::{CoinGeckoPriceFeed, FixturePriceFeed};
pub use settlement::{SimulatedSettlement, SimulatedTransfer};
