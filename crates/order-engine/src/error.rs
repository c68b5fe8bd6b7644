use coinvault_core::{AccountId, Asset, CorrelationId, OrderId, OrderStatus};
use coinvault_ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Unsupported symbol {0}")]
    UnsupportedSymbol(Asset),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Order {order_id} is {status}")]
    InvalidState { order_id: OrderId, status: OrderStatus },

    #[error("Account {0} is closed")]
    AccountClosed(AccountId),

    #[error("Correlation id {0} is already used by a different operation")]
    CorrelationConflict(CorrelationId),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for OrderError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountClosed(account_id) => OrderError::AccountClosed(account_id),
            other => OrderError::Ledger(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
