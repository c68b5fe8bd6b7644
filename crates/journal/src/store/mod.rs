//! Durable backends for the journal

mod jsonl;
mod memory;

pub(crate) use jsonl::JsonLinesFile;
pub use jsonl::JsonLinesJournalStore;
pub use memory::InMemoryJournalStore;

use coinvault_core::LedgerEntry;

use crate::error::Result;

/// Port for journal persistence
///
/// `persist` receives one committed batch at a time and must make it durable
/// as a unit before returning. A batch that fails to persist must not be
/// returned by a later `load`.
pub trait JournalStore: Send + Sync {
    fn persist(&self, batch: &[LedgerEntry]) -> Result<()>;

    /// Every persisted entry, in append order
    fn load(&self) -> Result<Vec<LedgerEntry>>;

    fn name(&self) -> &str {
        "JournalStore"
    }
}
