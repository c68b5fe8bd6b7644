use coinvault_core::Asset;
use thiserror::Error;

/// Failures of the market-data collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("No price available for {0}")]
    UnknownSymbol(Asset),

    #[error("Market data provider unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed market data response: {0}")]
    Malformed(String),
}

pub type MarketDataResult<T> = std::result::Result<T, MarketDataError>;

/// Failures of the settlement collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Settlement provider unreachable: {0}")]
    Unreachable(String),

    #[error("Transfer refused by settlement provider: {0}")]
    Refused(String),
}

pub type SettlementResult<T> = std::result::Result<T, SettlementError>;
