//! Cache Store Module
//!
//! Namespaced cache over a shared storage backend, with expiration checks on
//! read, purge-and-retry on a full backend, and deferred eviction callbacks.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{BackendError, StorageBackend};
use crate::cache::eviction::{self, PurgeReport};
use crate::cache::{
    is_expired, CacheEntry, CacheStats, Clock, EntryPolicy, EvictCallback, MaxSize,
    SystemClock, DEFAULT_FILL_FACTOR, KEY_PREFIX,
};
use crate::cache::stats::StatsRecorder;
use crate::error::{CacheError, Result};
use crate::tasks::Dispatcher;

struct StoreInner {
    namespace: String,
    /// `cache-storage.<namespace>.`
    prefix: String,
    backend: Arc<dyn StorageBackend>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    /// Process-local eviction callbacks by logical key
    callbacks: Mutex<HashMap<String, EvictCallback>>,
    stats: StatsRecorder,
    /// Set while a deferred purge is queued but not yet started
    purge_pending: AtomicBool,
    max_size: MaxSize,
    fill_factor: f64,
}

// == Cache Store ==
/// Handle to the cache for one namespace.
///
/// Clones share state, including statistics.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("namespace", &self.inner.namespace)
            .field("max_size", &self.inner.max_size)
            .field("fill_factor", &self.inner.fill_factor)
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Configures and validates a [`CacheStore`].
pub struct CacheStoreBuilder {
    namespace: String,
    backend: Arc<dyn StorageBackend>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    max_size: MaxSize,
    fill_factor: f64,
}

impl CacheStoreBuilder {
    pub fn max_size(mut self, max_size: MaxSize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Fraction of capacity retained by a purge. Values outside `(0, 1]`
    /// fall back to the default.
    pub fn fill_factor(mut self, fill_factor: f64) -> Self {
        self.fill_factor = fill_factor;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the store.
    ///
    /// Fails with `InvalidNamespace` if the namespace is empty or contains
    /// the `.` separator, which would let two namespaces share keys.
    pub fn build(self) -> Result<CacheStore> {
        if self.namespace.is_empty() || self.namespace.contains('.') {
            return Err(CacheError::InvalidNamespace(self.namespace));
        }
        let fill_factor = if self.fill_factor > 0.0 && self.fill_factor <= 1.0 {
            self.fill_factor
        } else {
            warn!(
                namespace = %self.namespace,
                "Fill factor {} is outside (0, 1], using {}",
                self.fill_factor,
                DEFAULT_FILL_FACTOR
            );
            DEFAULT_FILL_FACTOR
        };

        let prefix = format!("{}.{}.", KEY_PREFIX, self.namespace);
        Ok(CacheStore {
            inner: Arc::new(StoreInner {
                namespace: self.namespace,
                prefix,
                backend: self.backend,
                dispatcher: self.dispatcher,
                clock: self.clock,
                callbacks: Mutex::new(HashMap::new()),
                stats: StatsRecorder::default(),
                purge_pending: AtomicBool::new(false),
                max_size: self.max_size,
                fill_factor,
            }),
        })
    }
}

impl CacheStore {
    // == Constructor ==
    /// Starts building a store for `namespace` over `backend`.
    ///
    /// Defaults: unbounded, fill factor 0.75, system clock.
    pub fn builder(
        namespace: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
        dispatcher: Dispatcher,
    ) -> CacheStoreBuilder {
        CacheStoreBuilder {
            namespace: namespace.into(),
            backend,
            dispatcher,
            clock: Arc::new(SystemClock),
            max_size: MaxSize::Unbounded,
            fill_factor: DEFAULT_FILL_FACTOR,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn max_size(&self) -> MaxSize {
        self.inner.max_size
    }

    pub fn fill_factor(&self) -> f64 {
        self.inner.fill_factor
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.inner.prefix, key)
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// A replaced entry is removed first, so its eviction callback fires. The
    /// new callback is registered before the record is written, so an
    /// eviction racing the write still finds it. If the backend is full, one
    /// purge runs and the write is retried once. When a bounded store ends
    /// up over its size, a purge is deferred.
    pub fn set<V>(&self, key: &str, value: &V, policy: Option<EntryPolicy>) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let entry = CacheEntry::new(key, value, policy, self.now_ms())?;

        if self.contains(key) {
            self.remove(key)?;
        }

        {
            let mut callbacks = self.inner.callbacks.lock();
            match entry.evict_callback() {
                Some(callback) => callbacks.insert(key.to_string(), callback),
                None => callbacks.remove(key),
            };
        }
        if let Err(err) = self.persist(&entry) {
            self.inner.callbacks.lock().remove(key);
            return Err(err);
        }
        debug!(namespace = self.namespace(), key, "Setting key");

        if let MaxSize::Entries(max) = self.inner.max_size {
            if self.size() > max {
                self.schedule_purge();
            }
        }

        Ok(())
    }

    /// Writes the record, purging and retrying once on a capacity error.
    fn persist(&self, entry: &CacheEntry) -> Result<()> {
        let physical = self.physical_key(&entry.key);
        let record =
            serde_json::to_string(entry).map_err(|e| CacheError::Serialization(e.to_string()))?;

        match self.inner.backend.set(&physical, record.clone()) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() => {
                warn!(
                    namespace = self.namespace(),
                    key = %entry.key,
                    "Error adding item, purging and trying again: {}",
                    err
                );
                self.purge();
                self.inner.backend.set(&physical, record).map_err(|err| {
                    warn!(
                        namespace = self.namespace(),
                        key = %entry.key,
                        "Failed setting again, giving up: {}",
                        err
                    );
                    write_error(&entry.key, err)
                })
            }
            Err(err) => Err(write_error(&entry.key, err)),
        }
    }

    /// Queues a purge unless one is already waiting to run.
    fn schedule_purge(&self) {
        if self.inner.purge_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let store = self.clone();
        let queued = self.inner.dispatcher.defer(move || {
            store.inner.purge_pending.store(false, Ordering::Release);
            store.purge();
        });
        if !queued {
            self.inner.purge_pending.store(false, Ordering::Release);
        }
    }

    // == Get ==
    /// Returns the live value for `key`.
    ///
    /// An expired entry is removed and counted as a miss. A hit refreshes the
    /// entry's last-access time in the backend.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.now_ms();

        let entry = match self.load(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.inner.stats.record_miss();
                debug!(namespace = self.namespace(), key, "Cache MISS");
                return None;
            }
            Err(err) => {
                warn!(namespace = self.namespace(), key, "Unreadable entry: {}", err);
                self.inner.stats.record_miss();
                return None;
            }
        };

        if is_expired(&entry, now) {
            if let Err(err) = self.remove(key) {
                warn!(namespace = self.namespace(), key, "Failed to remove expired entry: {}", err);
            }
            self.inner.stats.record_expirations(1);
            self.inner.stats.record_miss();
            debug!(namespace = self.namespace(), key, "Cache MISS (expired)");
            return None;
        }

        let mut entry = entry;
        entry.touch(now);
        self.write_back(&entry);

        self.inner.stats.record_hit();
        debug!(namespace = self.namespace(), key, "Cache HIT");
        Some(entry.value)
    }

    /// Typed variant of [`get`](Self::get).
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Persists a refreshed access time. Only an existing record is
    /// updated, so an entry removed since it was read stays removed.
    /// Failure leaves the old time in place.
    fn write_back(&self, entry: &CacheEntry) {
        let record = match serde_json::to_string(entry) {
            Ok(record) => record,
            Err(err) => {
                warn!(namespace = self.namespace(), key = %entry.key, "Failed to encode entry: {}", err);
                return;
            }
        };
        match self
            .inner
            .backend
            .update(&self.physical_key(&entry.key), record)
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(namespace = self.namespace(), key = %entry.key, "Entry removed before access refresh");
            }
            Err(err) => {
                warn!(namespace = self.namespace(), key = %entry.key, "Failed to refresh last access: {}", err);
            }
        }
    }

    /// True if a record exists for `key`, expired or not.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.backend.get(&self.physical_key(key)).is_some()
    }

    /// Reads and decodes the record for `key` without touching statistics.
    pub(crate) fn load(&self, key: &str) -> std::result::Result<Option<CacheEntry>, serde_json::Error> {
        self.inner
            .backend
            .get(&self.physical_key(key))
            .map(|record| serde_json::from_str(&record))
            .transpose()
    }

    // == Remove ==
    /// Deletes `key` regardless of expiration and returns its value.
    ///
    /// The eviction callback, if any, runs later through the dispatcher.
    /// An unreadable record is deleted and reported as absent.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let physical = self.physical_key(key);
        let Some(record) = self.inner.backend.get(&physical) else {
            return Ok(None);
        };

        self.inner
            .backend
            .delete(&physical)
            .map_err(|err| write_error(key, err))?;
        let callback = self.inner.callbacks.lock().remove(key);

        let entry = match serde_json::from_str::<CacheEntry>(&record) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(namespace = self.namespace(), key, "Removed unreadable entry: {}", err);
                return Ok(None);
            }
        };
        debug!(namespace = self.namespace(), key, "Removed key");

        if let Some(callback) = callback {
            let key = entry.key.clone();
            let value = entry.value.clone();
            self.inner.dispatcher.defer(move || callback(&key, &value));
        }

        Ok(Some(entry.value))
    }

    // == Clear ==
    /// Removes every entry in the namespace, firing each callback.
    pub fn clear(&self) -> Result<()> {
        for key in self.keys() {
            self.remove(&key)?;
        }
        debug!(namespace = self.namespace(), "Cache cleared");
        Ok(())
    }

    // == Keys ==
    /// Every logical key in the namespace, including expired entries not yet
    /// purged.
    pub fn keys(&self) -> BTreeSet<String> {
        self.inner
            .backend
            .keys()
            .into_iter()
            .filter_map(|physical| {
                physical
                    .strip_prefix(self.inner.prefix.as_str())
                    .map(str::to_string)
            })
            .collect()
    }

    // == Size ==
    pub fn size(&self) -> usize {
        self.keys().len()
    }

    // == Stats ==
    /// Counters since the store was built.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    // == Purge ==
    /// Drops expired entries, then evicts down to the fill target.
    pub fn purge(&self) -> PurgeReport {
        let report = eviction::purge(self);
        self.inner.stats.record_purge();
        self.inner.stats.record_expirations(report.expired as u64);
        self.inner.stats.record_evictions(report.evicted as u64);
        report
    }
}

/// Maps a backend write failure to the caller-facing error.
fn write_error(key: &str, err: BackendError) -> CacheError {
    if err.is_quota_exceeded() {
        CacheError::StorageFull(format!("key '{}': {}", key, err))
    } else {
        CacheError::Serialization(format!("key '{}': {}", key, err))
    }
}
