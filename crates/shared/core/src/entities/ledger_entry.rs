use std::fmt;

use serde::{Deserialize, Serialize};

use crate::values::{AccountId, Amount, Asset, CorrelationId, Price, SequenceNumber, Timestamp};

/// Why a balance moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// Money arriving from outside
    Deposit,
    /// Money leaving to an external destination (amount plus fee)
    Withdrawal,
    /// Credit-back after a withdrawal could not be settled
    WithdrawalReversal,
    /// Asset given up by a fill
    TradeDebit,
    /// Asset received by a fill
    TradeCredit,
    /// Manual entry
    Adjustment,
    /// Zero-delta marker written when the account closes
    AccountClosure,
}

impl EntryReason {
    /// Entries that move value across the account boundary
    pub fn is_external(&self) -> bool {
        !matches!(
            self,
            EntryReason::TradeDebit | EntryReason::TradeCredit | EntryReason::AccountClosure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryReason::Deposit => "deposit",
            EntryReason::Withdrawal => "withdrawal",
            EntryReason::WithdrawalReversal => "withdrawal_reversal",
            EntryReason::TradeDebit => "trade_debit",
            EntryReason::TradeCredit => "trade_credit",
            EntryReason::Adjustment => "adjustment",
            EntryReason::AccountClosure => "account_closure",
        }
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry proposed to the journal, before it has a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub delta: Amount,
    pub reason: EntryReason,
    pub correlation_id: CorrelationId,
    pub timestamp: Timestamp,
    pub price: Option<Price>,
}

impl PendingEntry {
    pub fn new(
        account_id: AccountId,
        asset: Asset,
        delta: Amount,
        reason: EntryReason,
        correlation_id: CorrelationId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            account_id,
            asset,
            delta,
            reason,
            correlation_id,
            timestamp,
            price: None,
        }
    }

    /// Attach the execution or reference price (used for cost basis)
    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    /// Fix the entry at its journal position
    pub fn seal(self, sequence_number: SequenceNumber) -> LedgerEntry {
        LedgerEntry {
            account_id: self.account_id,
            asset: self.asset,
            delta: self.delta,
            reason: self.reason,
            correlation_id: self.correlation_id,
            sequence_number,
            timestamp: self.timestamp,
            price: self.price,
        }
    }
}

/// Immutable record of one balance delta for one account and asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    /// Signed change to the asset's total balance
    pub delta: Amount,
    pub reason: EntryReason,
    pub correlation_id: CorrelationId,
    /// Sole ordering authority within the account
    pub sequence_number: SequenceNumber,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl LedgerEntry {
    pub fn is_credit(&self) -> bool {
        self.delta.is_sign_positive() && !self.delta.is_zero()
    }
}
