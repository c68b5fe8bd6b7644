//! Withdrawal request entity
//!
//! Withdrawals go through these states:
//! 1. PendingPin - Request created, PIN not yet verified
//! 2. Approved - PIN verified and the account debited
//! 3. Settled - External transfer confirmed by the settlement provider
//! 4. Rejected - Refused before any balance moved
//! 5. FailedSettlement - Debit credited back, needs manual reconciliation

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;
use crate::values::{AccountId, Amount, Asset, CorrelationId, Timestamp};

/// Reference returned by the settlement provider
pub type SettlementId = String;

/// Unique identifier for a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawalId(Uuid);

impl WithdrawalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for WithdrawalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    #[default]
    PendingPin,
    Approved,
    Settled,
    Rejected,
    FailedSettlement,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::PendingPin => "pending_pin",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Settled => "settled",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::FailedSettlement => "failed_settlement",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the money goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Destination {
    /// On-chain address
    #[serde(rename_all = "camelCase")]
    Crypto { network: String, address: String },
    /// Bank account reference (IBAN, account number)
    #[serde(rename_all = "camelCase")]
    Bank { account_reference: String },
}

impl Destination {
    pub fn is_bank(&self) -> bool {
        matches!(self, Destination::Bank { .. })
    }

    /// Address or account reference
    pub fn target(&self) -> &str {
        match self {
            Destination::Crypto { address, .. } => address,
            Destination::Bank { account_reference } => account_reference,
        }
    }
}

/// A withdrawal request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub account_id: AccountId,
    pub asset: Asset,
    /// Amount that reaches the destination
    pub amount: Amount,
    /// Fee kept by the platform, in the withdrawn asset
    pub fee: Amount,
    pub destination: Destination,
    /// Salted digest of the PIN that was presented, never the PIN itself
    #[serde(skip_serializing, default)]
    pub pin_attempt_hash: String,
    pub status: WithdrawalStatus,
    pub correlation_id: CorrelationId,
    pub settlement_id: Option<SettlementId>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WithdrawalRequest {
    /// Create a new request awaiting PIN verification
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        asset: Asset,
        amount: Amount,
        fee: Amount,
        destination: Destination,
        pin_attempt_hash: String,
        correlation_id: Option<CorrelationId>,
        now: Timestamp,
    ) -> Self {
        let id = WithdrawalId::new();
        Self {
            id,
            account_id,
            asset,
            amount,
            fee,
            destination,
            pin_attempt_hash,
            status: WithdrawalStatus::PendingPin,
            correlation_id: correlation_id.unwrap_or_else(|| CorrelationId::from(id.0)),
            settlement_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total amount deducted from the account (amount + fee)
    pub fn total_debit(&self) -> Amount {
        self.amount + self.fee
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WithdrawalStatus::Settled | WithdrawalStatus::Rejected | WithdrawalStatus::FailedSettlement
        )
    }

    pub fn approve(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(WithdrawalStatus::PendingPin, WithdrawalStatus::Approved, now)
    }

    pub fn reject(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(WithdrawalStatus::PendingPin, WithdrawalStatus::Rejected, now)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    pub fn settle(&mut self, settlement_id: SettlementId, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(WithdrawalStatus::Approved, WithdrawalStatus::Settled, now)?;
        self.settlement_id = Some(settlement_id);
        Ok(())
    }

    pub fn fail_settlement(
        &mut self,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.transition(WithdrawalStatus::Approved, WithdrawalStatus::FailedSettlement, now)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn transition(
        &mut self,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        if self.status != from {
            return Err(TransitionError {
                entity: "withdrawal",
                from: self.status.to_string(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request() -> WithdrawalRequest {
        WithdrawalRequest::new(
            AccountId::from("acc-1"),
            Asset::new("BTC").unwrap(),
            dec!(0.01),
            dec!(0.0005),
            Destination::Crypto {
                network: "Bitcoin".to_string(),
                address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            },
            "digest".to_string(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut req = request();
        assert_eq!(req.total_debit(), dec!(0.0105));
        req.approve(Utc::now()).unwrap();
        req.settle("SIM-1".to_string(), Utc::now()).unwrap();
        assert_eq!(req.status, WithdrawalStatus::Settled);
        assert_eq!(req.settlement_id.as_deref(), Some("SIM-1"));
        assert!(req.is_terminal());
    }

    #[test]
    fn test_cannot_settle_unapproved() {
        let mut req = request();
        let err = req.settle("SIM-1".to_string(), Utc::now()).unwrap_err();
        assert_eq!(err.from, "pending_pin");
        assert_eq!(req.status, WithdrawalStatus::PendingPin);
    }

    #[test]
    fn test_failed_settlement_keeps_reason() {
        let mut req = request();
        req.approve(Utc::now()).unwrap();
        req.fail_settlement("provider unreachable", Utc::now()).unwrap();
        assert_eq!(req.status, WithdrawalStatus::FailedSettlement);
        assert!(req.reject("late", Utc::now()).is_err());
    }

    #[test]
    fn test_pin_digest_not_serialized() {
        let json = serde_json::to_value(request()).unwrap();
        assert!(json.get("pinAttemptHash").is_none());
        assert_eq!(json["status"], "pending_pin");
        assert_eq!(json["destination"]["type"], "crypto");
    }
}
