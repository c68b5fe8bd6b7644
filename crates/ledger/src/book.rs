use std::collections::{BTreeMap, HashMap};

use coinvault_core::{AccountId, AccountStatus, Amount, Asset, AssetBalance, EntryReason, LedgerEntry};
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::reservation::{ReservationId, ReservationToken};

/// Balances and open reservations of one account
///
/// The book never talks to the journal itself; the guard checks, journals
/// and only then calls the mutating methods here.
#[derive(Debug, Clone)]
pub struct AccountBook {
    account_id: AccountId,
    status: AccountStatus,
    balances: BTreeMap<Asset, AssetBalance>,
    reservations: HashMap<ReservationId, (Asset, Amount)>,
}

/// Point-in-time copy of an account's balances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub status: AccountStatus,
    pub balances: BTreeMap<Asset, AssetBalance>,
}

impl AccountSnapshot {
    pub fn balance(&self, asset: &Asset) -> AssetBalance {
        self.balances.get(asset).copied().unwrap_or_default()
    }
}

impl AccountBook {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            status: AccountStatus::Open,
            balances: BTreeMap::new(),
            reservations: HashMap::new(),
        }
    }

    /// Rebuild a book by folding entries in sequence order
    pub fn from_entries(account_id: AccountId, entries: impl IntoIterator<Item = LedgerEntry>) -> Result<Self> {
        let mut book = Self::new(account_id);
        for entry in entries {
            if entry.reason == EntryReason::AccountClosure {
                book.status = AccountStatus::Closed;
                continue;
            }
            book.check_delta(&entry.asset, entry.delta)?;
            book.adjust(&entry.asset, entry.delta);
        }
        Ok(book)
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn balance(&self, asset: &Asset) -> AssetBalance {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    pub fn balances(&self) -> &BTreeMap<Asset, AssetBalance> {
        &self.balances
    }

    pub fn outstanding_reservations(&self) -> usize {
        self.reservations.len()
    }

    /// True when every balance is zero and nothing is reserved
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.balances.values().all(AssetBalance::is_zero)
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account_id.clone(),
            status: self.status,
            balances: self
                .balances
                .iter()
                .filter(|(_, b)| !b.is_zero())
                .map(|(a, b)| (a.clone(), *b))
                .collect(),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.status {
            AccountStatus::Open => Ok(()),
            AccountStatus::Closed => Err(LedgerError::AccountClosed(self.account_id.clone())),
        }
    }

    /// Fails unless `amount` of `asset` is available
    pub(crate) fn check_available(&self, asset: &Asset, amount: Amount) -> Result<()> {
        let available = self.balance(asset).available;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: asset.clone(),
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Fails if applying `delta` would take available or the total past what
    /// a `Decimal` can hold
    pub(crate) fn check_delta(&self, asset: &Asset, delta: Amount) -> Result<()> {
        let balance = self.balance(asset);
        balance
            .available
            .checked_add(delta)
            .and_then(|_| balance.total().checked_add(delta))
            .map(|_| ())
            .ok_or_else(|| LedgerError::AmountOverflow {
                asset: asset.clone(),
                delta,
            })
    }

    pub(crate) fn hold(&mut self, id: ReservationId, asset: &Asset, amount: Amount) -> Result<()> {
        self.check_available(asset, amount)?;
        let balance = self.balances.entry(asset.clone()).or_default();
        balance.available -= amount;
        balance.reserved += amount;
        self.reservations.insert(id, (asset.clone(), amount));
        Ok(())
    }

    /// The token must name a reservation of this book with the same terms
    pub(crate) fn check_token(&self, token: &ReservationToken) -> Result<()> {
        let matches = token.account_id == self.account_id
            && self
                .reservations
                .get(&token.id)
                .is_some_and(|(asset, amount)| *asset == token.asset && *amount == token.amount);
        if matches {
            Ok(())
        } else {
            Err(LedgerError::UnknownReservation(token.id))
        }
    }

    /// Reserved amount goes back to available
    pub(crate) fn unhold(&mut self, id: ReservationId) {
        if let Some((asset, amount)) = self.reservations.remove(&id) {
            let balance = self.balances.entry(asset).or_default();
            balance.reserved -= amount;
            balance.available += amount;
        }
    }

    /// Reservation is consumed: `debit` leaves, the remainder is available again
    pub(crate) fn settle(&mut self, id: ReservationId, debit: Amount) {
        if let Some((asset, amount)) = self.reservations.remove(&id) {
            let balance = self.balances.entry(asset).or_default();
            balance.reserved -= amount;
            balance.available += amount - debit;
        }
    }

    /// Apply a signed delta to available
    pub(crate) fn adjust(&mut self, asset: &Asset, delta: Amount) {
        self.balances.entry(asset.clone()).or_default().available += delta;
    }

    pub(crate) fn close(&mut self) {
        self.status = AccountStatus::Closed;
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.balances.values().all(AssetBalance::is_consistent)
    }

    /// Sum of available and reserved per asset
    pub fn totals(&self) -> BTreeMap<Asset, Amount> {
        self.balances
            .iter()
            .map(|(a, b)| (a.clone(), b.total()))
            .filter(|(_, total)| *total != Decimal::ZERO)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coinvault_core::{CorrelationId, PendingEntry};
    use rust_decimal_macros::dec;

    fn entry(seq: u64, asset: Asset, delta: Amount, reason: EntryReason) -> LedgerEntry {
        PendingEntry::new(
            AccountId::from("acc-1"),
            asset,
            delta,
            reason,
            CorrelationId::from(format!("c{seq}")),
            Utc::now(),
        )
        .seal(seq)
    }

    #[test]
    fn test_from_entries_folds_deltas() {
        let btc = Asset::new("BTC").unwrap();
        let book = AccountBook::from_entries(
            AccountId::from("acc-1"),
            vec![
                entry(1, Asset::usd(), dec!(1000), EntryReason::Deposit),
                entry(2, Asset::usd(), dec!(-400.4), EntryReason::TradeDebit),
                entry(3, btc.clone(), dec!(0.01), EntryReason::TradeCredit),
            ],
        )
        .unwrap();

        assert_eq!(book.balance(&Asset::usd()).available, dec!(599.6));
        assert_eq!(book.balance(&btc).available, dec!(0.01));
        assert_eq!(book.status(), AccountStatus::Open);
    }

    #[test]
    fn test_closure_marker_closes() {
        let book = AccountBook::from_entries(
            AccountId::from("acc-1"),
            vec![entry(1, Asset::usd(), dec!(0), EntryReason::AccountClosure)],
        )
        .unwrap();
        assert_eq!(book.status(), AccountStatus::Closed);
        assert!(book.ensure_open().is_err());
    }

    #[test]
    fn test_from_entries_refuses_overflowing_history() {
        let result = AccountBook::from_entries(
            AccountId::from("acc-1"),
            vec![
                entry(1, Asset::usd(), Decimal::MAX - dec!(1), EntryReason::Deposit),
                entry(2, Asset::usd(), Decimal::MAX - dec!(1), EntryReason::Deposit),
            ],
        );
        assert!(matches!(result, Err(LedgerError::AmountOverflow { .. })));
    }

    #[test]
    fn test_check_delta_counts_reserved() {
        let mut book = AccountBook::new(AccountId::from("acc-1"));
        book.adjust(&Asset::usd(), Decimal::MAX - dec!(10));
        book.hold(ReservationId(1), &Asset::usd(), Decimal::MAX - dec!(20)).unwrap();

        assert!(book.check_delta(&Asset::usd(), dec!(10)).is_ok());
        assert!(book.check_delta(&Asset::usd(), dec!(11)).is_err());
        assert!(book.check_delta(&Asset::usd(), dec!(-5)).is_ok());
    }

    #[test]
    fn test_hold_and_settle_partial() {
        let mut book = AccountBook::new(AccountId::from("acc-1"));
        book.adjust(&Asset::usd(), dec!(100));

        book.hold(ReservationId(1), &Asset::usd(), dec!(60)).unwrap();
        assert_eq!(book.balance(&Asset::usd()), AssetBalance::new(dec!(40), dec!(60)));

        book.settle(ReservationId(1), dec!(50));
        assert_eq!(book.balance(&Asset::usd()), AssetBalance::new(dec!(50), dec!(0)));
        assert!(book.is_consistent());
    }

    #[test]
    fn test_hold_refuses_overdraft() {
        let mut book = AccountBook::new(AccountId::from("acc-1"));
        book.adjust(&Asset::usd(), dec!(10));

        let err = book.hold(ReservationId(1), &Asset::usd(), dec!(10.01)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(book.balance(&Asset::usd()).available, dec!(10));
    }
}
