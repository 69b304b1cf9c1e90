//! Record storage - persistence for the session record
//!
//! Each key maps to one `<key>.json` file. Writes go through a temporary
//! file and a rename so a record is always replaced wholesale.

use smartbank_core::{BankError, BankResult, ErrorContext, RecordStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// File-backed record store
pub struct FileRecordStore {
    /// Base directory for records
    storage_dir: PathBuf,
}

impl FileRecordStore {
    /// Create a new record store, creating the directory if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> BankResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| storage_error(e, "create_dir"))?;

        info!("Record storage initialized at: {}", storage_dir.display());

        Ok(Self { storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn record_path(&self, key: &str) -> BankResult<PathBuf> {
        validate_key(key)?;
        Ok(self.storage_dir.join(format!("{}.json", key)))
    }
}

impl RecordStore for FileRecordStore {
    fn load(&self, key: &str) -> BankResult<Option<String>> {
        let path = self.record_path(key)?;

        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read_to_string(&path).map_err(|e| storage_error(e, "load"))?;
        debug!("Loaded record {} from {}", key, path.display());
        Ok(Some(data))
    }

    fn save(&self, key: &str, value: &str) -> BankResult<()> {
        let path = self.record_path(key)?;
        let staging = self.storage_dir.join(format!(".{}.json.tmp", key));

        std::fs::write(&staging, value).map_err(|e| storage_error(e, "save"))?;
        std::fs::rename(&staging, &path).map_err(|e| storage_error(e, "save"))?;

        debug!("Saved record {} to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> BankResult<()> {
        let path = self.record_path(key)?;

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed record file: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e, "remove")),
        }
    }
}

/// In-process record store
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, key: &str) -> BankResult<Option<String>> {
        Ok(self.records().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> BankResult<()> {
        self.records().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BankResult<()> {
        self.records().remove(key);
        Ok(())
    }
}

fn validate_key(key: &str) -> BankResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(BankError::Storage {
            message: format!("Invalid record key: {:?}", key),
            source: None,
            context: ErrorContext::new("record_store").with_operation("validate_key"),
        })
    }
}

fn storage_error(error: std::io::Error, operation: &str) -> BankError {
    BankError::Storage {
        message: format!("Record storage failed: {}", error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("record_store")
            .with_operation(operation)
            .with_suggestion("Check that the data directory is writable"),
    }
}
