use std::sync::atomic::{AtomicBool, Ordering};

use coinvault_core::LedgerEntry;
use parking_lot::RwLock;

use super::JournalStore;
use crate::error::{JournalError, Result};

/// Volatile store for tests and throwaway runs
#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: RwLock<Vec<LedgerEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage: every persist fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JournalStore for InMemoryJournalStore {
    fn persist(&self, batch: &[LedgerEntry]) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(JournalError::Unavailable("in-memory store offline".to_string()));
        }
        self.entries.write().extend_from_slice(batch);
        Ok(())
    }

    fn load(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.read().clone())
    }

    fn name(&self) -> &str {
        "InMemoryJournalStore"
    }
}
