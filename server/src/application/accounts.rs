//! Account lifecycle hooks for the identity provider

use std::sync::Arc;

use coinvault_core::{AccountId, AuditEvent, AuditKind};
use coinvault_journal::AuditLog;
use coinvault_ledger::{AccountLedger, AccountSnapshot, LedgerError};
use coinvault_withdrawal_guard::{PIN_LENGTH, PinHasher, WithdrawalError, WithdrawalGuard};
use log::info;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Withdrawal(#[from] WithdrawalError),
}

/// Registered account as the API reports it
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub snapshot: AccountSnapshot,
    pub has_pin: bool,
}

pub struct AccountDesk {
    ledger: Arc<AccountLedger>,
    withdrawals: Arc<WithdrawalGuard>,
    audit: Arc<AuditLog>,
}

impl AccountDesk {
    pub fn new(ledger: Arc<AccountLedger>, withdrawals: Arc<WithdrawalGuard>, audit: Arc<AuditLog>) -> Self {
        Self {
            ledger,
            withdrawals,
            audit,
        }
    }

    /// Register an account, optionally provisioning its withdrawal PIN
    ///
    /// Registering an open account again is a no-op.
    pub async fn open(&self, account_id: &AccountId, pin: Option<&str>) -> Result<AccountSummary, AccountError> {
        if pin.is_some_and(|p| !PinHasher::is_valid_format(p)) {
            return Err(WithdrawalError::InvalidPinFormat(PIN_LENGTH).into());
        }

        let known = self.ledger.accounts().contains(account_id);
        let snapshot = self.ledger.open_account(account_id).await?;
        if let Some(pin) = pin {
            self.withdrawals.set_pin(account_id, pin).await?;
        }

        if !known {
            self.audit.record(AuditEvent::new(
                account_id.clone(),
                AuditKind::AccountOpened,
                "account registered",
                self.ledger.clock().now(),
            ));
            info!("Account {} registered", account_id);
        }
        self.summary(snapshot)
    }

    pub async fn close(&self, account_id: &AccountId) -> Result<AccountSummary, AccountError> {
        let snapshot = self.ledger.close_account(account_id).await?;
        self.audit.record(AuditEvent::new(
            account_id.clone(),
            AuditKind::AccountClosed,
            "account closed",
            self.ledger.clock().now(),
        ));
        self.summary(snapshot)
    }

    pub async fn summary_of(&self, account_id: &AccountId) -> Result<AccountSummary, AccountError> {
        let snapshot = self.ledger.snapshot(account_id).await;
        self.summary(snapshot)
    }

    fn summary(&self, snapshot: AccountSnapshot) -> Result<AccountSummary, AccountError> {
        let has_pin = self.withdrawals.has_pin(&snapshot.account_id)?;
        Ok(AccountSummary { snapshot, has_pin })
    }
}
