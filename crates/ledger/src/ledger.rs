use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use coinvault_core::{AccountId, AccountStatus, Amount, Asset, AssetBalance, LedgerEntry, SequenceNumber};
use coinvault_journal::TransactionJournal;
use coinvault_ports::Clock;
use dashmap::DashMap;
use log::info;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::book::{AccountBook, AccountSnapshot};
use crate::error::{LedgerError, Result};
use crate::guard::AccountGuard;
use crate::reservation::{ReservationToken, Settlement, Transfer};

/// Result of comparing live balances with a fresh journal replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub account_id: AccountId,
    pub entries: usize,
    pub last_sequence: SequenceNumber,
    /// available + reserved per asset, identical on both sides
    pub totals: BTreeMap<Asset, Amount>,
}

/// Authoritative per-account balance store
///
/// Books live in a `DashMap` keyed by account, each behind its own
/// `tokio::sync::Mutex`. Accounts never share a lock, so different accounts
/// proceed in parallel.
pub struct AccountLedger {
    journal: Arc<TransactionJournal>,
    clock: Arc<dyn Clock>,
    books: DashMap<AccountId, Arc<Mutex<AccountBook>>>,
    reservation_seq: Arc<AtomicU64>,
}

impl AccountLedger {
    /// Rebuild every account found in the journal
    pub fn recover(journal: Arc<TransactionJournal>, clock: Arc<dyn Clock>) -> Result<Self> {
        let books = DashMap::new();
        for account_id in journal.accounts() {
            let book = AccountBook::from_entries(account_id.clone(), journal.replay(&account_id))?;
            books.insert(account_id, Arc::new(Mutex::new(book)));
        }
        info!("Ledger recovered {} accounts from the journal", books.len());

        Ok(Self {
            journal,
            clock,
            books,
            reservation_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn journal(&self) -> &Arc<TransactionJournal> {
        &self.journal
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn book(&self, account_id: &AccountId) -> Arc<Mutex<AccountBook>> {
        if let Some(book) = self.books.get(account_id) {
            return Arc::clone(book.value());
        }
        let entry = self
            .books
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AccountBook::new(account_id.clone()))));
        Arc::clone(entry.value())
    }

    /// Enter the account's exclusive section, waiting in FIFO order
    pub async fn lock(&self, account_id: &AccountId) -> AccountGuard {
        let book = self.book(account_id).lock_owned().await;
        AccountGuard::new(
            book,
            Arc::clone(&self.journal),
            Arc::clone(&self.clock),
            Arc::clone(&self.reservation_seq),
        )
    }

    /// Registration hook; opening an existing open account is a no-op
    pub async fn open_account(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        let guard = self.lock(account_id).await;
        if guard.status() == AccountStatus::Closed {
            return Err(LedgerError::AccountClosed(account_id.clone()));
        }
        Ok(guard.snapshot())
    }

    /// Close an account whose balances are all zero; closure is terminal
    pub async fn close_account(&self, account_id: &AccountId) -> Result<AccountSnapshot> {
        let mut guard = self.lock(account_id).await;
        guard.close()?;
        info!("Account {} closed", account_id);
        Ok(guard.snapshot())
    }

    pub async fn reserve(&self, account_id: &AccountId, asset: &Asset, amount: Decimal) -> Result<ReservationToken> {
        self.lock(account_id).await.reserve(asset, amount)
    }

    pub async fn commit(&self, token: ReservationToken, settlement: Settlement) -> Result<Vec<LedgerEntry>> {
        let account_id = token.account_id().clone();
        self.lock(&account_id).await.commit(token, settlement)
    }

    pub async fn release(&self, token: ReservationToken) -> Result<()> {
        let account_id = token.account_id().clone();
        self.lock(&account_id).await.release(token)
    }

    pub async fn apply_transfer(&self, account_id: &AccountId, transfer: Transfer) -> Result<LedgerEntry> {
        self.lock(account_id).await.apply_transfer(transfer)
    }

    pub async fn balance(&self, account_id: &AccountId, asset: &Asset) -> AssetBalance {
        self.lock(account_id).await.balance(asset)
    }

    pub async fn snapshot(&self, account_id: &AccountId) -> AccountSnapshot {
        self.lock(account_id).await.snapshot()
    }

    pub async fn status(&self, account_id: &AccountId) -> AccountStatus {
        self.lock(account_id).await.status()
    }

    /// Rebuild the account from the journal and compare with live totals
    pub async fn verify_replay(&self, account_id: &AccountId) -> Result<ReplayReport> {
        let book = self.book(account_id);
        let live = book.lock().await;

        let replay = self.journal.replay(account_id);
        let entries = replay.len();
        let rebuilt = AccountBook::from_entries(account_id.clone(), replay)?;

        let live_totals = live.totals();
        let replayed_totals = rebuilt.totals();
        let assets: BTreeSet<&Asset> = live_totals.keys().chain(replayed_totals.keys()).collect();
        for asset in assets {
            let live_total = live_totals.get(asset).copied().unwrap_or_default();
            let replayed = replayed_totals.get(asset).copied().unwrap_or_default();
            if live_total != replayed {
                return Err(LedgerError::ReplayMismatch {
                    account_id: account_id.clone(),
                    asset: asset.clone(),
                    live: live_total,
                    replayed,
                });
            }
        }

        Ok(ReplayReport {
            account_id: account_id.clone(),
            entries,
            last_sequence: self.journal.last_sequence(account_id),
            totals: live_totals,
        })
    }

    /// Accounts the ledger currently holds a book for
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.books.iter().map(|e| e.key().clone()).collect();
        accounts.sort();
        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinvault_clock::ManualClock;
    use coinvault_core::{CorrelationId, EntryReason};
    use coinvault_journal::InMemoryJournalStore;
    use rust_decimal_macros::dec;

    fn ledger() -> (AccountLedger, Arc<InMemoryJournalStore>) {
        let store = Arc::new(InMemoryJournalStore::new());
        let journal = Arc::new(TransactionJournal::open(store.clone()).unwrap());
        let ledger = AccountLedger::recover(journal, Arc::new(ManualClock::starting_now())).unwrap();
        (ledger, store)
    }

    fn btc() -> Asset {
        Asset::new("BTC").unwrap()
    }

    fn deposit(amount: Decimal, correlation: &str) -> Transfer {
        Transfer::new(Asset::usd(), amount, EntryReason::Deposit, CorrelationId::from(correlation))
    }

    #[tokio::test]
    async fn test_buy_fill_moves_both_assets() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(1000), "dep-1")).await.unwrap();

        let token = ledger.reserve(&alice, &Asset::usd(), dec!(400.4)).await.unwrap();
        let settlement = Settlement::debit(CorrelationId::from("order-1"), dec!(400.4), EntryReason::TradeDebit)
            .with_credit(btc(), dec!(0.01), EntryReason::TradeCredit)
            .at_price(dec!(40000));
        let entries = ledger.commit(token, settlement).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence_number, 2);
        assert_eq!(entries[1].sequence_number, 3);
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(599.6), dec!(0)));
        assert_eq!(ledger.balance(&alice, &btc()).await.available, dec!(0.01));
    }

    #[tokio::test]
    async fn test_release_restores_available() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(100), "dep-1")).await.unwrap();

        let token = ledger.reserve(&alice, &Asset::usd(), dec!(70)).await.unwrap();
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(30), dec!(70)));

        ledger.release(token).await.unwrap();
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(100), dec!(0)));
    }

    #[tokio::test]
    async fn test_overdraft_transfer_refused() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(10), "dep-1")).await.unwrap();

        let err = ledger
            .apply_transfer(&alice, deposit(dec!(-10.5), "wd-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.journal().last_sequence(&alice), 1);
    }

    #[tokio::test]
    async fn test_duplicate_transfer_returns_original() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        let first = ledger.apply_transfer(&alice, deposit(dec!(10), "dep-1")).await.unwrap();

        match ledger.apply_transfer(&alice, deposit(dec!(10), "dep-1")).await {
            Err(LedgerError::DuplicateCorrelationId { original, .. }) => assert_eq!(original, vec![first]),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await.available, dec!(10));
    }

    #[tokio::test]
    async fn test_journal_failure_leaves_balances_untouched() {
        let (ledger, store) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(100), "dep-1")).await.unwrap();

        store.set_unavailable(true);
        let token = ledger.reserve(&alice, &Asset::usd(), dec!(50)).await.unwrap();
        let result = ledger
            .commit(token, Settlement::debit(CorrelationId::from("wd-1"), dec!(50), EntryReason::Withdrawal))
            .await;
        assert!(matches!(result, Err(LedgerError::Journal(_))));
        assert!(ledger.apply_transfer(&alice, deposit(dec!(5), "dep-2")).await.is_err());

        // Reservation released, nothing applied
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(100), dec!(0)));
        assert_eq!(ledger.verify_replay(&alice).await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_commit_cannot_exceed_reservation() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(100), "dep-1")).await.unwrap();

        let token = ledger.reserve(&alice, &Asset::usd(), dec!(10)).await.unwrap();
        let err = ledger
            .commit(token, Settlement::debit(CorrelationId::from("x"), dec!(11), EntryReason::Withdrawal))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CommitExceedsReservation { .. }));
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await.available, dec!(100));
    }

    #[tokio::test]
    async fn test_token_bound_to_its_account() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        ledger.apply_transfer(&alice, deposit(dec!(100), "dep-1")).await.unwrap();
        ledger.apply_transfer(&bob, deposit(dec!(100), "dep-1")).await.unwrap();

        let token = ledger.reserve(&alice, &Asset::usd(), dec!(10)).await.unwrap();
        let mut bob_guard = ledger.lock(&bob).await;
        assert!(matches!(bob_guard.release(token), Err(LedgerError::UnknownReservation(_))));
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        assert!(matches!(
            ledger.reserve(&alice, &Asset::usd(), dec!(0)).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.apply_transfer(&alice, deposit(dec!(0), "z")).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_close_requires_empty_account() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(5), "dep-1")).await.unwrap();

        assert!(matches!(
            ledger.close_account(&alice).await,
            Err(LedgerError::AccountNotEmpty(_))
        ));

        ledger.apply_transfer(&alice, deposit(dec!(-5), "wd-1")).await.unwrap();
        let snapshot = ledger.close_account(&alice).await.unwrap();
        assert_eq!(snapshot.status, AccountStatus::Closed);

        assert!(matches!(
            ledger.apply_transfer(&alice, deposit(dec!(1), "dep-2")).await,
            Err(LedgerError::AccountClosed(_))
        ));
        assert!(matches!(ledger.open_account(&alice).await, Err(LedgerError::AccountClosed(_))));
    }

    #[tokio::test]
    async fn test_recover_rebuilds_balances_and_closure() {
        let store = Arc::new(InMemoryJournalStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let alice = AccountId::from("alice");
        let carol = AccountId::from("carol");

        {
            let journal = Arc::new(TransactionJournal::open(store.clone()).unwrap());
            let ledger = AccountLedger::recover(journal, clock.clone()).unwrap();
            ledger.apply_transfer(&alice, deposit(dec!(250), "dep-1")).await.unwrap();
            // Outstanding at "crash" time
            let _held = ledger.reserve(&alice, &Asset::usd(), dec!(100)).await.unwrap();
            ledger.apply_transfer(&carol, deposit(dec!(1), "dep-1")).await.unwrap();
            ledger.apply_transfer(&carol, deposit(dec!(-1), "wd-1")).await.unwrap();
            ledger.close_account(&carol).await.unwrap();
        }

        let journal = Arc::new(TransactionJournal::open(store).unwrap());
        let ledger = AccountLedger::recover(journal, clock).unwrap();
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(250), dec!(0)));
        assert_eq!(ledger.status(&carol).await, AccountStatus::Closed);
    }

    #[tokio::test]
    async fn test_overflowing_deposit_is_refused_before_journaling() {
        let (ledger, store) = ledger();
        let alice = AccountId::from("alice");
        let huge = Decimal::MAX - dec!(1);
        ledger.apply_transfer(&alice, deposit(huge, "dep-1")).await.unwrap();

        let err = ledger.apply_transfer(&alice, deposit(huge, "dep-2")).await.unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { .. }));
        assert_eq!(ledger.journal().last_sequence(&alice), 1);

        // The journal still replays into a ledger
        let journal = Arc::new(TransactionJournal::open(store).unwrap());
        let recovered = AccountLedger::recover(journal, Arc::new(ManualClock::starting_now())).unwrap();
        assert_eq!(recovered.balance(&alice, &Asset::usd()).await.available, huge);
    }

    #[tokio::test]
    async fn test_overflowing_credit_leg_releases_reservation() {
        let (ledger, _) = ledger();
        let alice = AccountId::from("alice");
        ledger.apply_transfer(&alice, deposit(dec!(100), "dep-1")).await.unwrap();
        ledger
            .apply_transfer(&alice, Transfer::new(btc(), Decimal::MAX, EntryReason::Deposit, CorrelationId::from("dep-2")))
            .await
            .unwrap();

        let token = ledger.reserve(&alice, &Asset::usd(), dec!(50)).await.unwrap();
        let settlement = Settlement::debit(CorrelationId::from("order-1"), dec!(50), EntryReason::TradeDebit)
            .with_credit(btc(), dec!(1), EntryReason::TradeCredit);
        let err = ledger.commit(token, settlement).await.unwrap_err();

        assert!(matches!(err, LedgerError::AmountOverflow { .. }));
        assert_eq!(ledger.balance(&alice, &Asset::usd()).await, AssetBalance::new(dec!(100), dec!(0)));
        assert_eq!(ledger.journal().last_sequence(&alice), 2);
    }
}
