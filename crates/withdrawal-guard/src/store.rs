use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use coinvault_core::AccountId;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::error::PinStoreError;
use crate::pin::PinRecord;

/// Persistence for PIN digests and lockout counters
pub trait PinStore: Send + Sync {
    fn load(&self, account_id: &AccountId) -> Result<Option<PinRecord>, PinStoreError>;

    fn save(&self, account_id: &AccountId, record: &PinRecord) -> Result<(), PinStoreError>;

    fn name(&self) -> &str {
        "PinStore"
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPinStore {
    records: RwLock<HashMap<AccountId, PinRecord>>,
}

impl InMemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinStore for InMemoryPinStore {
    fn load(&self, account_id: &AccountId) -> Result<Option<PinRecord>, PinStoreError> {
        Ok(self.records.read().get(account_id).cloned())
    }

    fn save(&self, account_id: &AccountId, record: &PinRecord) -> Result<(), PinStoreError> {
        self.records.write().insert(account_id.clone(), record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "InMemoryPinStore"
    }
}

/// All records in one JSON object, rewritten through a temp file and rename
#[derive(Debug)]
pub struct JsonFilePinStore {
    path: PathBuf,
    records: Mutex<HashMap<AccountId, PinRecord>>,
}

impl JsonFilePinStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PinStoreError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Opened PIN store {} ({} accounts)", path.display(), records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, records: &HashMap<AccountId, PinRecord>) -> Result<(), PinStoreError> {
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(records)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_data()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PinStore for JsonFilePinStore {
    fn load(&self, account_id: &AccountId) -> Result<Option<PinRecord>, PinStoreError> {
        Ok(self.records.lock().get(account_id).cloned())
    }

    fn save(&self, account_id: &AccountId, record: &PinRecord) -> Result<(), PinStoreError> {
        let mut records = self.records.lock();
        let previous = records.insert(account_id.clone(), record.clone());
        if let Err(e) = self.write_atomically(&records) {
            // Memory must not run ahead of the file
            match previous {
                Some(previous) => records.insert(account_id.clone(), previous),
                None => records.remove(account_id),
            };
            return Err(e);
        }
        debug!("Saved PIN record for {}", account_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "JsonFilePinStore"
    }
}
