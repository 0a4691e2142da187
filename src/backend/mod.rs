//! Backend Module
//!
//! Synchronous, string-keyed persistent key-value stores with a byte quota.
//! Cache stores for every namespace share one backend.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use thiserror::Error;

// == Public Constants ==
/// Default byte quota, matching the usual browser storage limit
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

// == Backend Error ==
/// Failure reported by a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The write would push usage over the byte quota
    #[error("quota exceeded: {requested} bytes requested, quota is {quota} bytes")]
    QuotaExceeded { requested: usize, quota: usize },

    /// Underlying I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be decoded
    #[error("corrupt storage: {0}")]
    Corrupt(String),
}

impl BackendError {
    /// True when this is the capacity error.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BackendError::QuotaExceeded { .. })
    }
}

// == Storage Backend Trait ==
/// Contract of the backing store.
///
/// Reads and enumeration are infallible; writes and deletes may fail.
pub trait StorageBackend: Send + Sync {
    /// Returns the raw record stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, failing with `QuotaExceeded` when full.
    fn set(&self, key: &str, value: String) -> Result<(), BackendError>;

    /// Replaces the value of an existing `key` atomically. Returns
    /// `Ok(false)` without writing when the key is absent.
    fn update(&self, key: &str, value: String) -> Result<bool, BackendError>;

    /// Deletes `key`. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Enumerates every key in the backend, across all namespaces.
    fn keys(&self) -> Vec<String>;
}
