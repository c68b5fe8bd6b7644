use serde::{Deserialize, Serialize};

use crate::values::{AccountId, CorrelationId, Timestamp};

/// Non-balance event kept for the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    OrderRejected,
    OrderCancelled,
    WithdrawalRejected,
    PinFailed,
    PinLocked,
    PinChanged,
    SettlementFailed,
    AccountOpened,
    AccountClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub account_id: AccountId,
    pub correlation_id: Option<CorrelationId>,
    pub kind: AuditKind,
    pub detail: String,
    pub timestamp: Timestamp,
}

impl AuditEvent {
    pub fn new(account_id: AccountId, kind: AuditKind, detail: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            account_id,
            correlation_id: None,
            kind,
            detail: detail.into(),
            timestamp,
        }
    }

    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}
