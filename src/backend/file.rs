//! File-persisted backend.
//!
//! Records live in memory and are flushed to a single JSON document after
//! every mutation, so they survive process restarts. A mutation whose flush
//! fails is rolled back in memory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{BackendError, MemoryBackend, StorageBackend};

// == File Backend ==
/// Key-value store persisted to a JSON file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    records: MemoryBackend,
    /// Serializes mutate-then-flush sequences
    flush_lock: Mutex<()>,
}

impl FileBackend {
    // == Constructor ==
    /// Opens the store at `path`, loading existing records if the file exists.
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> Result<Self, BackendError> {
        let path = path.into();

        let records: BTreeMap<String, String> = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&bytes).map_err(|e| {
                    BackendError::Corrupt(format!("{}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        info!(
            "Opened file backend at {} with {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            records: MemoryBackend::from_records(records, quota),
            flush_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.records.used_bytes()
    }

    // == Flush ==
    /// Writes every record to a temp file, then renames it over the target.
    fn flush(&self) -> Result<(), BackendError> {
        let snapshot = self.records.snapshot();
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| BackendError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Flushed {} records to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    /// Flushes a mutation of `key`, restoring `previous` if the flush fails.
    fn commit(&self, key: &str, previous: Option<String>) -> Result<(), BackendError> {
        let Err(err) = self.flush() else {
            return Ok(());
        };

        let restored = match previous {
            Some(value) => self.records.set(key, value),
            None => self.records.delete(key),
        };
        if let Err(restore_err) = restored {
            warn!(key, "Failed to roll back unflushed write: {}", restore_err);
        }
        Err(err)
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.records.get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), BackendError> {
        let _guard = self.flush_lock.lock();
        let previous = self.records.get(key);
        self.records.set(key, value)?;
        self.commit(key, previous)
    }

    fn update(&self, key: &str, value: String) -> Result<bool, BackendError> {
        let _guard = self.flush_lock.lock();
        let Some(previous) = self.records.get(key) else {
            return Ok(false);
        };
        self.records.set(key, value)?;
        self.commit(key, Some(previous))?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let _guard = self.flush_lock.lock();
        let Some(previous) = self.records.get(key) else {
            return Ok(());
        };
        self.records.delete(key)?;
        self.commit(key, Some(previous))
    }

    fn keys(&self) -> Vec<String> {
        self.records.keys()
    }
}
