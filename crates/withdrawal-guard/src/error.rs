use coinvault_core::{AccountId, Amount, Asset, CorrelationId, TransitionError, WithdrawalId};
use coinvault_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PinStoreError {
    #[error("PIN store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PIN store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum WithdrawalError {
    #[error("Invalid withdrawal request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported asset {0}")]
    UnsupportedAsset(Asset),

    #[error("PIN must be exactly {0} digits")]
    InvalidPinFormat(usize),

    #[error("Minimum withdrawal for {asset} is {minimum}")]
    BelowMinimum { asset: Asset, minimum: Amount },

    #[error("Insufficient {asset} balance: {required} required including fee")]
    InsufficientBalance { asset: Asset, required: Amount },

    #[error("Invalid PIN, {remaining_attempts} attempts remaining")]
    InvalidPin { remaining_attempts: u32 },

    #[error("Too many invalid PIN attempts, retry in {retry_after_secs}s")]
    PinLocked { retry_after_secs: i64 },

    #[error("No withdrawal PIN set for {0}")]
    PinNotSet(AccountId),

    #[error("Withdrawal PIN already set for {0}")]
    PinAlreadySet(AccountId),

    #[error("Withdrawal {0} was already processed before a restart; reconcile manually")]
    DuplicateRequest(CorrelationId),

    #[error("Withdrawal {0} not found")]
    RequestNotFound(WithdrawalId),

    #[error("Account {0} is closed")]
    AccountClosed(AccountId),

    #[error(transparent)]
    InvalidState(#[from] TransitionError),

    #[error("PIN store error: {0}")]
    PinStore(#[from] PinStoreError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for WithdrawalError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountClosed(account_id) => WithdrawalError::AccountClosed(account_id),
            other => WithdrawalError::Ledger(other),
        }
    }
}

impl WithdrawalError {
    /// Errors that are stored as rejected requests and audited
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WithdrawalError::BelowMinimum { .. }
                | WithdrawalError::InsufficientBalance { .. }
                | WithdrawalError::InvalidPin { .. }
                | WithdrawalError::PinLocked { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WithdrawalError>;
