use std::collections::HashMap;
use std::sync::Arc;

use coinvault_core::{AccountId, CorrelationId, LedgerEntry, PendingEntry, SequenceNumber};
use log::{debug, info};
use parking_lot::RwLock;

use crate::error::{JournalError, Result};
use crate::replay::Replay;
use crate::store::JournalStore;

/// Entries of one account plus the correlation index over them
#[derive(Default)]
pub(crate) struct AccountStream {
    pub(crate) entries: Vec<LedgerEntry>,
    correlations: HashMap<CorrelationId, Vec<usize>>,
}

impl AccountStream {
    fn next_sequence(&self) -> SequenceNumber {
        self.entries.len() as SequenceNumber + 1
    }

    fn push(&mut self, entry: LedgerEntry) {
        self.correlations
            .entry(entry.correlation_id.clone())
            .or_default()
            .push(self.entries.len());
        self.entries.push(entry);
    }

    fn find(&self, correlation_id: &CorrelationId) -> Option<Vec<LedgerEntry>> {
        self.correlations
            .get(correlation_id)
            .map(|positions| positions.iter().map(|&i| self.entries[i].clone()).collect())
    }
}

pub(crate) type Streams = HashMap<AccountId, AccountStream>;

/// Append-only, idempotent journal of ledger entries
///
/// Appends for all accounts go through one write lock so the store sees
/// batches in the same order as the in-memory index. The index is updated
/// only after the store accepted the batch.
pub struct TransactionJournal {
    store: Arc<dyn JournalStore>,
    streams: Arc<RwLock<Streams>>,
}

impl TransactionJournal {
    /// Load and index everything the store holds
    pub fn open(store: Arc<dyn JournalStore>) -> Result<Self> {
        let mut streams = Streams::new();
        let mut total = 0usize;

        for entry in store.load()? {
            let stream = streams.entry(entry.account_id.clone()).or_default();
            let expected = stream.next_sequence();
            if entry.sequence_number != expected {
                return Err(JournalError::Corrupt(format!(
                    "account {} expected sequence {} but found {}",
                    entry.account_id, expected, entry.sequence_number
                )));
            }
            stream.push(entry);
            total += 1;
        }

        info!(
            "Journal opened on {}: {} entries across {} accounts",
            store.name(),
            total,
            streams.len()
        );

        Ok(Self {
            store,
            streams: Arc::new(RwLock::new(streams)),
        })
    }

    /// Append a single entry and return its sequence number
    pub fn append(&self, entry: PendingEntry) -> Result<SequenceNumber> {
        let sequences = self.append_batch(vec![entry])?;
        sequences
            .first()
            .copied()
            .ok_or(JournalError::EmptyBatch)
    }

    /// Append entries that share one account and one correlation id
    ///
    /// Either every entry is persisted and indexed or none is.
    pub fn append_batch(&self, batch: Vec<PendingEntry>) -> Result<Vec<SequenceNumber>> {
        let (account_id, correlation_id) = match batch.first() {
            Some(first) => (first.account_id.clone(), first.correlation_id.clone()),
            None => return Err(JournalError::EmptyBatch),
        };
        if batch
            .iter()
            .any(|e| e.account_id != account_id || e.correlation_id != correlation_id)
        {
            return Err(JournalError::MixedBatch);
        }

        // One store file, one writer: appends from all accounts serialize here,
        // including the fsync, so the file order matches sequence order
        let mut streams = self.streams.write();
        let stream = streams.entry(account_id.clone()).or_default();

        if let Some(original) = stream.find(&correlation_id) {
            return Err(JournalError::DuplicateCorrelationId {
                account_id,
                correlation_id,
                original,
            });
        }

        let first = stream.next_sequence();
        let sealed: Vec<LedgerEntry> = batch
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.seal(first + i as SequenceNumber))
            .collect();

        // Write-ahead: nothing becomes visible unless the store took it
        self.store.persist(&sealed)?;

        let sequences = sealed.iter().map(|e| e.sequence_number).collect();
        for entry in sealed {
            stream.push(entry);
        }

        debug!(
            "Journaled {} for account {} at sequence {}",
            correlation_id, account_id, first
        );
        Ok(sequences)
    }

    /// Lazy, restartable iteration over an account's entries in order
    pub fn replay(&self, account_id: &AccountId) -> Replay {
        let end = self
            .streams
            .read()
            .get(account_id)
            .map(|s| s.entries.len())
            .unwrap_or(0);
        Replay::new(Arc::clone(&self.streams), account_id.clone(), end)
    }

    /// Entries committed under `correlation_id`, if any
    pub fn find(&self, account_id: &AccountId, correlation_id: &CorrelationId) -> Option<Vec<LedgerEntry>> {
        self.streams.read().get(account_id)?.find(correlation_id)
    }

    /// Every account with at least one entry
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self
            .streams
            .read()
            .iter()
            .filter(|(_, stream)| !stream.entries.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        accounts.sort();
        accounts
    }

    /// Sequence number of the newest entry, 0 for an empty account
    pub fn last_sequence(&self, account_id: &AccountId) -> SequenceNumber {
        self.streams
            .read()
            .get(account_id)
            .map(|s| s.entries.len() as SequenceNumber)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryJournalStore;
    use chrono::Utc;
    use coinvault_core::{Asset, EntryReason};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pending(account: &str, correlation: &str, asset: Asset, delta: Decimal) -> PendingEntry {
        PendingEntry::new(
            AccountId::from(account),
            asset,
            delta,
            EntryReason::Adjustment,
            CorrelationId::from(correlation),
            Utc::now(),
        )
    }

    fn journal() -> TransactionJournal {
        TransactionJournal::open(Arc::new(InMemoryJournalStore::new())).unwrap()
    }

    #[test]
    fn test_sequences_are_per_account() {
        let journal = journal();
        assert_eq!(journal.append(pending("a", "1", Asset::usd(), dec!(5))).unwrap(), 1);
        assert_eq!(journal.append(pending("a", "2", Asset::usd(), dec!(5))).unwrap(), 2);
        assert_eq!(journal.append(pending("b", "1", Asset::usd(), dec!(5))).unwrap(), 1);
        assert_eq!(journal.last_sequence(&AccountId::from("a")), 2);
    }

    #[test]
    fn test_duplicate_correlation_returns_original() {
        let journal = journal();
        journal.append(pending("a", "dep-1", Asset::usd(), dec!(100))).unwrap();

        let err = journal
            .append(pending("a", "dep-1", Asset::usd(), dec!(999)))
            .unwrap_err();
        match err {
            JournalError::DuplicateCorrelationId { original, .. } => {
                assert_eq!(original.len(), 1);
                assert_eq!(original[0].delta, dec!(100));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(journal.last_sequence(&AccountId::from("a")), 1);
    }

    #[test]
    fn test_same_correlation_on_other_account_is_fine() {
        let journal = journal();
        journal.append(pending("a", "x", Asset::usd(), dec!(1))).unwrap();
        assert!(journal.append(pending("b", "x", Asset::usd(), dec!(1))).is_ok());
    }

    #[test]
    fn test_batch_is_contiguous() {
        let journal = journal();
        let btc = Asset::new("BTC").unwrap();
        let sequences = journal
            .append_batch(vec![
                pending("a", "order-1", Asset::usd(), dec!(-400.4)),
                pending("a", "order-1", btc, dec!(0.01)),
            ])
            .unwrap();
        assert_eq!(sequences, vec![1, 2]);

        let found = journal
            .find(&AccountId::from("a"), &CorrelationId::from("order-1"))
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_mixed_and_empty_batches_rejected() {
        let journal = journal();
        assert!(matches!(journal.append_batch(vec![]), Err(JournalError::EmptyBatch)));
        assert!(matches!(
            journal.append_batch(vec![
                pending("a", "1", Asset::usd(), dec!(1)),
                pending("a", "2", Asset::usd(), dec!(1)),
            ]),
            Err(JournalError::MixedBatch)
        ));
    }

    #[test]
    fn test_failed_persist_leaves_no_trace() {
        let store = Arc::new(InMemoryJournalStore::new());
        let journal = TransactionJournal::open(store.clone()).unwrap();

        store.set_unavailable(true);
        assert!(journal.append(pending("a", "1", Asset::usd(), dec!(1))).is_err());
        assert_eq!(journal.last_sequence(&AccountId::from("a")), 0);

        store.set_unavailable(false);
        assert_eq!(journal.append(pending("a", "1", Asset::usd(), dec!(1))).unwrap(), 1);
    }

    #[test]
    fn test_open_rejects_gaps() {
        let store = Arc::new(InMemoryJournalStore::new());
        let entry = pending("a", "1", Asset::usd(), dec!(1)).seal(2);
        store.persist(&[entry]).unwrap();

        assert!(matches!(
            TransactionJournal::open(store),
            Err(JournalError::Corrupt(_))
        ));
    }
}
