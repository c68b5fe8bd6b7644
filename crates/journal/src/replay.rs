use std::sync::Arc;

use coinvault_core::{AccountId, LedgerEntry};
use parking_lot::RwLock;

use crate::journal::Streams;

/// Cursor over one account's entries
///
/// The end is fixed when the cursor is created, so a replay is finite even
/// while new entries arrive. Each step takes the read lock only long enough
/// to clone one entry. [`Replay::rewind`] starts over from sequence 1.
#[derive(Clone)]
pub struct Replay {
    streams: Arc<RwLock<Streams>>,
    account_id: AccountId,
    position: usize,
    end: usize,
}

impl Replay {
    pub(crate) fn new(streams: Arc<RwLock<Streams>>, account_id: AccountId, end: usize) -> Self {
        Self {
            streams,
            account_id,
            position: 0,
            end,
        }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }
}

impl Iterator for Replay {
    type Item = LedgerEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }
        let entry = self
            .streams
            .read()
            .get(&self.account_id)?
            .entries
            .get(self.position)
            .cloned()?;
        self.position += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Replay {}
