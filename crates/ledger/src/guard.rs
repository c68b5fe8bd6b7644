use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use coinvault_core::{
    AccountId, AccountStatus, Asset, AssetBalance, CorrelationId, EntryReason, LedgerEntry, PendingEntry,
};
use coinvault_journal::TransactionJournal;
use coinvault_ports::Clock;
use log::{debug, warn};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use crate::book::{AccountBook, AccountSnapshot};
use crate::error::{LedgerError, Result};
use crate::reservation::{ReservationId, ReservationToken, Settlement, Transfer};

/// Exclusive section over one account
///
/// Holding the guard serializes every other ledger operation on the same
/// account; waiters are admitted in arrival order. Drop it to leave the
/// section.
pub struct AccountGuard {
    book: OwnedMutexGuard<AccountBook>,
    journal: Arc<TransactionJournal>,
    clock: Arc<dyn Clock>,
    reservation_seq: Arc<AtomicU64>,
}

impl AccountGuard {
    pub(crate) fn new(
        book: OwnedMutexGuard<AccountBook>,
        journal: Arc<TransactionJournal>,
        clock: Arc<dyn Clock>,
        reservation_seq: Arc<AtomicU64>,
    ) -> Self {
        Self {
            book,
            journal,
            clock,
            reservation_seq,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        self.book.account_id()
    }

    pub fn status(&self) -> AccountStatus {
        self.book.status()
    }

    pub fn balance(&self, asset: &Asset) -> AssetBalance {
        self.book.balance(asset)
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.book.snapshot()
    }

    /// Entries already committed under `correlation_id`
    pub fn committed(&self, correlation_id: &CorrelationId) -> Option<Vec<LedgerEntry>> {
        self.journal.find(self.book.account_id(), correlation_id)
    }

    /// Move `amount` from available to reserved
    pub fn reserve(&mut self, asset: &Asset, amount: Decimal) -> Result<ReservationToken> {
        self.book.ensure_open()?;
        positive(amount)?;

        let id = ReservationId(self.reservation_seq.fetch_add(1, Ordering::Relaxed) + 1);
        if let Err(e) = self.book.hold(id, asset, amount) {
            warn!("Reserve {} {} on {} refused: {}", amount, asset, self.account_id(), e);
            return Err(e);
        }

        debug!("Reserved {} {} on {} as {}", amount, asset, self.account_id(), id);
        Ok(ReservationToken {
            id,
            account_id: self.book.account_id().clone(),
            asset: asset.clone(),
            amount,
        })
    }

    /// Give a reservation back to available
    pub fn release(&mut self, token: ReservationToken) -> Result<()> {
        self.book.check_token(&token)?;
        self.book.unhold(token.id);
        debug!("Released {} ({} {})", token.id, token.amount, token.asset);
        Ok(())
    }

    /// Turn a reservation into journaled entries
    ///
    /// If the settlement is invalid or the journal refuses the batch, the
    /// reservation is released so the consumed token never strands funds.
    pub fn commit(&mut self, token: ReservationToken, settlement: Settlement) -> Result<Vec<LedgerEntry>> {
        self.book.check_token(&token)?;
        let credit_check = match &settlement.credit {
            Some(credit) => self.book.check_delta(&credit.asset, credit.amount),
            None => Ok(()),
        };
        if let Err(e) = validate_settlement(&token, &settlement).and(credit_check) {
            self.book.unhold(token.id);
            return Err(e);
        }

        let now = self.clock.now();
        let account_id = self.book.account_id().clone();
        let with_price = |entry: PendingEntry| match settlement.price {
            Some(price) => entry.with_price(price),
            None => entry,
        };

        let mut batch = vec![with_price(PendingEntry::new(
            account_id.clone(),
            token.asset.clone(),
            -settlement.debit,
            settlement.debit_reason,
            settlement.correlation_id.clone(),
            now,
        ))];
        if let Some(credit) = &settlement.credit {
            batch.push(with_price(PendingEntry::new(
                account_id,
                credit.asset.clone(),
                credit.amount,
                credit.reason,
                settlement.correlation_id.clone(),
                now,
            )));
        }

        let sequences = match self.journal.append_batch(batch.clone()) {
            Ok(sequences) => sequences,
            Err(e) => {
                self.book.unhold(token.id);
                return Err(e.into());
            }
        };

        self.book.settle(token.id, settlement.debit);
        if let Some(credit) = &settlement.credit {
            self.book.adjust(&credit.asset, credit.amount);
        }
        debug_assert!(self.book.is_consistent());

        debug!(
            "Committed {} on {}: -{} {}",
            settlement.correlation_id,
            self.account_id(),
            settlement.debit,
            token.asset
        );
        Ok(batch
            .into_iter()
            .zip(sequences)
            .map(|(entry, seq)| entry.seal(seq))
            .collect())
    }

    /// Journal and apply a direct balance change
    pub fn apply_transfer(&mut self, transfer: Transfer) -> Result<LedgerEntry> {
        // A retry must see its original result even if balances moved since
        if let Some(original) = self.committed(&transfer.correlation_id) {
            return Err(LedgerError::DuplicateCorrelationId {
                correlation_id: transfer.correlation_id,
                original,
            });
        }
        self.book.ensure_open()?;
        if transfer.delta.is_zero() {
            return Err(LedgerError::InvalidAmount(transfer.delta));
        }
        if transfer.delta.is_sign_negative() {
            self.book.check_available(&transfer.asset, -transfer.delta)?;
        }
        self.book.check_delta(&transfer.asset, transfer.delta)?;

        let mut entry = PendingEntry::new(
            self.book.account_id().clone(),
            transfer.asset.clone(),
            transfer.delta,
            transfer.reason,
            transfer.correlation_id,
            self.clock.now(),
        );
        if let Some(price) = transfer.price {
            entry = entry.with_price(price);
        }

        let seq = self.journal.append(entry.clone())?;
        self.book.adjust(&transfer.asset, transfer.delta);
        debug_assert!(self.book.is_consistent());

        debug!(
            "Applied {} {} {} to {} at sequence {}",
            transfer.reason,
            transfer.delta,
            transfer.asset,
            self.account_id(),
            seq
        );
        Ok(entry.seal(seq))
    }

    /// Journal the closure marker and close the book
    pub(crate) fn close(&mut self) -> Result<LedgerEntry> {
        self.book.ensure_open()?;
        if !self.book.is_empty() {
            return Err(LedgerError::AccountNotEmpty(self.account_id().clone()));
        }

        let entry = PendingEntry::new(
            self.book.account_id().clone(),
            Asset::usd(),
            Decimal::ZERO,
            EntryReason::AccountClosure,
            CorrelationId::new(self.account_id().as_str()).derive("closure"),
            self.clock.now(),
        );
        let seq = self.journal.append(entry.clone())?;
        self.book.close();
        Ok(entry.seal(seq))
    }
}

fn validate_settlement(token: &ReservationToken, settlement: &Settlement) -> Result<()> {
    positive(settlement.debit)?;
    if settlement.debit > token.amount {
        return Err(LedgerError::CommitExceedsReservation {
            reserved: token.amount,
            debit: settlement.debit,
        });
    }
    match &settlement.credit {
        Some(credit) => positive(credit.amount),
        None => Ok(()),
    }
}

fn positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
