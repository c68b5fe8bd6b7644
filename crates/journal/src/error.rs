use coinvault_core::{AccountId, CorrelationId, LedgerEntry};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Correlation id {correlation_id} already committed for account {account_id}")]
    DuplicateCorrelationId {
        account_id: AccountId,
        correlation_id: CorrelationId,
        original: Vec<LedgerEntry>,
    },

    #[error("Cannot append an empty batch")]
    EmptyBatch,

    #[error("A batch must share one account and one correlation id")]
    MixedBatch,

    #[error("Journal storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Journal encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Journal storage unavailable: {0}")]
    Unavailable(String),

    #[error("Journal corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, JournalError>;
