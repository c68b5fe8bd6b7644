use std::fmt;

use coinvault_core::{AccountId, Amount, Asset, CorrelationId, EntryReason, Price};

/// Handle of an outstanding reservation inside one account book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(pub(crate) u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Proof that `amount` of `asset` is held for the caller
///
/// Deliberately not `Clone`: commit and release consume the token, so a
/// reservation is finalized exactly once.
#[derive(Debug)]
#[must_use = "a reservation must be committed or released"]
pub struct ReservationToken {
    pub(crate) id: ReservationId,
    pub(crate) account_id: AccountId,
    pub(crate) asset: Asset,
    pub(crate) amount: Amount,
}

impl ReservationToken {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Credit leg of a commit, on another asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub asset: Asset,
    pub amount: Amount,
    pub reason: EntryReason,
}

/// How a reservation turns into permanent entries
///
/// `debit` is taken from the reserved asset (any remainder of the reservation
/// returns to available); the optional credit lands in another asset. All
/// entries are journaled as one batch under `correlation_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub correlation_id: CorrelationId,
    pub debit: Amount,
    pub debit_reason: EntryReason,
    pub credit: Option<Credit>,
    pub price: Option<Price>,
}

impl Settlement {
    pub fn debit(correlation_id: CorrelationId, amount: Amount, reason: EntryReason) -> Self {
        Self {
            correlation_id,
            debit: amount,
            debit_reason: reason,
            credit: None,
            price: None,
        }
    }

    pub fn with_credit(mut self, asset: Asset, amount: Amount, reason: EntryReason) -> Self {
        self.credit = Some(Credit {
            asset,
            amount,
            reason,
        });
        self
    }

    /// Execution price recorded on every entry of the batch
    pub fn at_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }
}

/// Direct balance change with no reservation phase (deposits, withdrawals,
/// manual entries)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub asset: Asset,
    pub delta: Amount,
    pub reason: EntryReason,
    pub correlation_id: CorrelationId,
    pub price: Option<Price>,
}

impl Transfer {
    pub fn new(asset: Asset, delta: Amount, reason: EntryReason, correlation_id: CorrelationId) -> Self {
        Self {
            asset,
            delta,
            reason,
            correlation_id,
            price: None,
        }
    }

    pub fn at_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }
}
