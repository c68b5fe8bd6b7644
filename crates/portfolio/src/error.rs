use coinvault_core::{Asset, Timestamp};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("Price for {symbol} is stale (as of {as_of})")]
    StalePrice { symbol: Asset, as_of: Timestamp },

    #[error("No price available for {symbol}: {reason}")]
    PriceUnavailable { symbol: Asset, reason: String },
}

pub type Result<T> = std::result::Result<T, ValuationError>;
