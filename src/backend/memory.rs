//! In-memory backend with a byte quota.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{BackendError, StorageBackend, DEFAULT_QUOTA_BYTES};

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, String>,
    used_bytes: usize,
}

impl MemoryState {
    /// Inserts or replaces `key`, leaving state untouched when over quota.
    fn insert(&mut self, key: &str, value: String, quota: usize) -> Result<(), BackendError> {
        let previous = self
            .records
            .get(key)
            .map(|old| key.len() + old.len())
            .unwrap_or(0);
        let requested = self.used_bytes - previous + key.len() + value.len();

        if requested > quota {
            return Err(BackendError::QuotaExceeded { requested, quota });
        }

        self.records.insert(key.to_string(), value);
        self.used_bytes = requested;
        Ok(())
    }
}

// == Memory Backend ==
/// Ordered in-memory key-value store.
///
/// Usage is counted as `key.len() + value.len()` per record.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    quota: usize,
}

impl MemoryBackend {
    /// Creates an empty backend with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    /// Creates an empty backend holding at most `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            quota,
        }
    }

    /// Creates a backend preloaded with `records`.
    ///
    /// Preloaded records are accepted even if they exceed the quota.
    pub fn from_records(records: BTreeMap<String, String>, quota: usize) -> Self {
        let used_bytes = records.iter().map(|(k, v)| k.len() + v.len()).sum();
        Self {
            state: Mutex::new(MemoryState {
                records,
                used_bytes,
            }),
            quota,
        }
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.state.lock().used_bytes
    }

    /// The configured byte quota.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Copy of every record, for persistence.
    pub(crate) fn snapshot(&self) -> BTreeMap<String, String> {
        self.state.lock().records.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.state.lock().records.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), BackendError> {
        self.state.lock().insert(key, value, self.quota)
    }

    fn update(&self, key: &str, value: String) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        if !state.records.contains_key(key) {
            return Ok(false);
        }
        state.insert(key, value, self.quota)?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if let Some(old) = state.records.remove(key) {
            state.used_bytes -= key.len() + old.len();
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.state.lock().records.keys().cloned().collect()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let backend = MemoryBackend::new();

        backend.set("a", "1".to_string()).unwrap();
        assert_eq!(backend.get("a"), Some("1".to_string()));

        backend.delete("a").unwrap();
        assert_eq!(backend.get("a"), None);
        assert_eq!(backend.used_bytes(), 0);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let backend = MemoryBackend::new();
        assert!(backend.delete("missing").is_ok());
    }

    #[test]
    fn test_quota_exceeded_leaves_state_unchanged() {
        let backend = MemoryBackend::with_quota(10);

        backend.set("k1", "1234".to_string()).unwrap();
        let err = backend.set("k2", "123456".to_string()).unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(backend.get("k2"), None);
        assert_eq!(backend.used_bytes(), 6);
    }

    #[test]
    fn test_overwrite_accounts_for_previous_value() {
        let backend = MemoryBackend::with_quota(10);

        backend.set("k", "12345678".to_string()).unwrap();
        // Replacing in place only needs the difference
        backend.set("k", "87654321".to_string()).unwrap();

        assert_eq!(backend.used_bytes(), 9);
    }

    #[test]
    fn test_update_only_touches_existing_keys() {
        let backend = MemoryBackend::new();

        assert!(!backend.update("k", "1".to_string()).unwrap());
        assert_eq!(backend.get("k"), None);

        backend.set("k", "1".to_string()).unwrap();
        assert!(backend.update("k", "22".to_string()).unwrap());
        assert_eq!(backend.get("k"), Some("22".to_string()));
        assert_eq!(backend.used_bytes(), 3);
    }

    #[test]
    fn test_keys_are_sorted() {
        let backend = MemoryBackend::new();
        backend.set("b", "x".to_string()).unwrap();
        backend.set("a", "x".to_string()).unwrap();
        backend.set("c", "x".to_string()).unwrap();

        assert_eq!(backend.keys(), vec!["a", "b", "c"]);
    }
}
