use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use coinvault_core::LedgerEntry;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::JournalStore;
use crate::error::{JournalError, Result};

/// Append-only file of newline-terminated JSON records
///
/// A record is written with a single `write_all` followed by `sync_data`.
/// A final line without its newline is a torn write from a crash; it is cut
/// off when the file is opened.
pub(crate) struct JsonLinesFile {
    path: PathBuf,
    state: Mutex<FileState>,
}

struct FileState {
    file: File,
    len: u64,
}

impl JsonLinesFile {
    /// Open (or create) the file and return the records already in it
    pub(crate) fn open<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(Self, Vec<T>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let (records, good_len) = read_records(&path)?;
        let len = file.metadata()?.len();
        if good_len < len {
            warn!(
                "{}: dropping {} bytes of torn trailing record",
                path.display(),
                len - good_len
            );
            file.set_len(good_len)?;
            file.sync_data()?;
        }

        Ok((
            Self {
                path,
                state: Mutex::new(FileState { file, len: good_len }),
            },
            records,
        ))
    }

    pub(crate) fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut state = self.state.lock();
        let written = state
            .file
            .write_all(&line)
            .and_then(|_| state.file.sync_data());
        if let Err(e) = written {
            // Cut whatever part of the record made it to disk
            let len = state.len;
            if let Err(trim) = state.file.set_len(len) {
                warn!("{}: failed to trim partial record: {}", self.path.display(), trim);
            }
            return Err(e.into());
        }
        state.len += line.len() as u64;
        Ok(())
    }

    pub(crate) fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let _state = self.state.lock();
        read_records(&self.path).map(|(records, _)| records)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse complete lines; returns the records and the byte length they cover
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut good_len = 0u64;
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        if !line.ends_with('\n') {
            // Torn tail, the caller decides whether to cut it
            break;
        }
        let body = line.trim();
        if !body.is_empty() {
            let record = serde_json::from_str(body).map_err(|e| {
                JournalError::Corrupt(format!("{} line {}: {}", path.display(), line_no, e))
            })?;
            records.push(record);
        }
        good_len += read as u64;
    }

    Ok((records, good_len))
}

/// Journal persisted as JSON lines, one committed batch per line
///
/// Keeping a batch on one line makes a fill's debit and credit durable
/// together: a crash mid-write loses the whole batch, never half of it.
pub struct JsonLinesJournalStore {
    file: JsonLinesFile,
}

impl JsonLinesJournalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (file, batches): (_, Vec<Vec<LedgerEntry>>) = JsonLinesFile::open(path)?;
        info!(
            "Opened journal file {} with {} batches",
            file.path().display(),
            batches.len()
        );
        Ok(Self { file })
    }
}

impl JournalStore for JsonLinesJournalStore {
    fn persist(&self, batch: &[LedgerEntry]) -> Result<()> {
        self.file.append(&batch)?;
        debug!("Persisted batch of {} entries", batch.len());
        Ok(())
    }

    fn load(&self) -> Result<Vec<LedgerEntry>> {
        let batches: Vec<Vec<LedgerEntry>> = self.file.read_all()?;
        Ok(batches.into_iter().flatten().collect())
    }

    fn name(&self) -> &str {
        "JsonLinesJournalStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coinvault_core::{AccountId, Asset, CorrelationId, EntryReason, PendingEntry};
    use rust_decimal_macros::dec;
    use std::io::Write as _;

    fn entry(seq: u64, correlation: &str) -> LedgerEntry {
        PendingEntry::new(
            AccountId::from("acc-1"),
            Asset::usd(),
            dec!(10),
            EntryReason::Deposit,
            CorrelationId::from(correlation),
            Utc::now(),
        )
        .seal(seq)
    }

    #[test]
    fn test_batches_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let store = JsonLinesJournalStore::open(&path).unwrap();
        store.persist(&[entry(1, "a")]).unwrap();
        store.persist(&[entry(2, "b"), entry(3, "b")]).unwrap();
        drop(store);

        let reopened = JsonLinesJournalStore::open(&path).unwrap();
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].sequence_number, 3);
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let store = JsonLinesJournalStore::open(&path).unwrap();
        store.persist(&[entry(1, "a")]).unwrap();
        drop(store);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"[{\"accountId\":\"acc-1\",\"as").unwrap();
        drop(file);

        let reopened = JsonLinesJournalStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 1);

        // Appends after the repair land on a clean line
        reopened.persist(&[entry(2, "b")]).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 2);
    }

    #[test]
    fn test_garbage_in_the_middle_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, "not json\n[]\n").unwrap();

        let result = JsonLinesJournalStore::open(&path);
        assert!(matches!(result, Err(JournalError::Corrupt(_))));
    }
}
