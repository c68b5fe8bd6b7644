use coinvault_core::{AccountId, Amount, Asset, CorrelationId, LedgerEntry};
use coinvault_journal::JournalError;
use thiserror::Error;

use crate::reservation::ReservationId;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient {asset} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        asset: Asset,
        available: Amount,
        requested: Amount,
    },

    #[error("Correlation id {correlation_id} already committed")]
    DuplicateCorrelationId {
        correlation_id: CorrelationId,
        original: Vec<LedgerEntry>,
    },

    #[error("Unknown reservation {0}")]
    UnknownReservation(ReservationId),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("Applying {delta} {asset} would overflow the balance")]
    AmountOverflow { asset: Asset, delta: Amount },

    #[error("Debit {debit} exceeds reserved {reserved}")]
    CommitExceedsReservation { reserved: Amount, debit: Amount },

    #[error("Account {0} is closed")]
    AccountClosed(AccountId),

    #[error("Account {0} still holds balances or reservations")]
    AccountNotEmpty(AccountId),

    #[error("Account {account_id} {asset}: live total {live} but replay gives {replayed}")]
    ReplayMismatch {
        account_id: AccountId,
        asset: Asset,
        live: Amount,
        replayed: Amount,
    },

    #[error("Journal error: {0}")]
    Journal(JournalError),
}

impl From<JournalError> for LedgerError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::DuplicateCorrelationId {
                correlation_id,
                original,
                ..
            } => LedgerError::DuplicateCorrelationId {
                correlation_id,
                original,
            },
            other => LedgerError::Journal(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
