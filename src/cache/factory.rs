//! Namespace Factory
//!
//! Validates namespace identifiers and hands out one store per namespace.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::cache::{CacheStore, MaxSize, DEFAULT_FILL_FACTOR};
use crate::config::{BackendKind, Config};
use crate::error::{CacheError, Result};
use crate::tasks::Dispatcher;

// == Validate Namespace ==
/// Parses a namespace token: ASCII digits only, value greater than zero.
pub fn validate_namespace(namespace: &str) -> Result<u64> {
    if namespace.is_empty() || !namespace.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CacheError::InvalidNamespace(format!(
            "Invalid app id or namespace: {:?}",
            namespace
        )));
    }

    match namespace.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CacheError::InvalidNamespace(format!(
            "Invalid app id or namespace: {:?}",
            namespace
        ))),
    }
}

// == Cache Factory ==
/// Builds stores bound to a shared backend.
///
/// Holds no registry of the stores it creates; callers keep their handles.
#[derive(Clone)]
pub struct CacheFactory {
    backend: Option<Arc<dyn StorageBackend>>,
    dispatcher: Dispatcher,
    max_size: MaxSize,
    fill_factor: f64,
}

impl CacheFactory {
    // == Constructor ==
    /// Creates a factory over `backend`; `None` models a runtime without
    /// persistent storage.
    pub fn new(backend: Option<Arc<dyn StorageBackend>>, dispatcher: Dispatcher) -> Self {
        Self {
            backend,
            dispatcher,
            max_size: MaxSize::Unbounded,
            fill_factor: DEFAULT_FILL_FACTOR,
        }
    }

    /// Opens the backend named by `config` and applies its sizing.
    pub fn from_config(config: &Config, dispatcher: Dispatcher) -> Result<Self> {
        let backend: Option<Arc<dyn StorageBackend>> = match config.backend {
            BackendKind::Memory => Some(Arc::new(MemoryBackend::with_quota(config.quota_bytes))),
            BackendKind::File => {
                let backend = FileBackend::open(&config.data_path, config.quota_bytes)
                    .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;
                Some(Arc::new(backend))
            }
            BackendKind::Disabled => {
                warn!("No storage backend configured, caching is unavailable");
                None
            }
        };

        Ok(Self::new(backend, dispatcher)
            .with_max_size(config.max_size)
            .with_fill_factor(config.fill_factor))
    }

    pub fn with_max_size(mut self, max_size: MaxSize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_fill_factor(mut self, fill_factor: f64) -> Self {
        self.fill_factor = fill_factor;
        self
    }

    // == Get Cache ==
    /// Returns a store for `namespace`.
    ///
    /// The namespace is used verbatim in the key prefix once validated, so
    /// `"007"` and `"7"` are distinct namespaces.
    pub fn get_cache(&self, namespace: &str) -> Result<CacheStore> {
        validate_namespace(namespace)?;
        self.build_store(namespace.to_string())
    }

    /// Returns a store for a numeric namespace, in its decimal form.
    pub fn get_cache_by_id(&self, id: u64) -> Result<CacheStore> {
        if id == 0 {
            return Err(CacheError::InvalidNamespace(
                "Invalid app id or namespace: 0".to_string(),
            ));
        }
        self.build_store(id.to_string())
    }

    fn build_store(&self, namespace: String) -> Result<CacheStore> {
        let backend = self.backend.clone().ok_or_else(|| {
            CacheError::BackendUnavailable("Unsupported storage type".to_string())
        })?;

        debug!(namespace = %namespace, "Creating cache store");
        CacheStore::builder(namespace, backend, self.dispatcher.clone())
            .max_size(self.max_size)
            .fill_factor(self.fill_factor)
            .build()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks;
    use serde_json::json;

    fn memory_factory() -> CacheFactory {
        let (dispatcher, _queue) = tasks::channel();
        CacheFactory::new(Some(Arc::new(MemoryBackend::new())), dispatcher)
    }

    #[test]
    fn test_validate_namespace() {
        assert_eq!(validate_namespace("7").unwrap(), 7);
        assert_eq!(validate_namespace("007").unwrap(), 7);
        for bad in ["", "0", "000", "-3", "abc", "12a", "1.2", " 5", "99999999999999999999999"] {
            assert!(
                matches!(validate_namespace(bad), Err(CacheError::InvalidNamespace(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_get_cache_defaults() {
        let factory = memory_factory();
        let store = factory.get_cache("15").unwrap();

        assert_eq!(store.namespace(), "15");
        assert_eq!(store.max_size(), MaxSize::Unbounded);
        assert_eq!(store.fill_factor(), 0.75);
    }

    #[test]
    fn test_get_cache_invalid_namespace() {
        let factory = memory_factory();
        assert!(matches!(
            factory.get_cache("nope"),
            Err(CacheError::InvalidNamespace(_))
        ));
        assert!(matches!(
            factory.get_cache_by_id(0),
            Err(CacheError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn test_get_cache_without_backend() {
        let (dispatcher, _queue) = tasks::channel();
        let factory = CacheFactory::new(None, dispatcher);

        assert!(matches!(
            factory.get_cache("1"),
            Err(CacheError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_namespace_used_verbatim_in_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        let (dispatcher, _queue) = tasks::channel();
        let factory = CacheFactory::new(Some(backend.clone()), dispatcher);

        let padded = factory.get_cache("007").unwrap();
        padded.set("k", "v", None).unwrap();

        assert_eq!(padded.namespace(), "007");
        assert_eq!(backend.keys(), vec!["cache-storage.007.k"]);

        let numeric = factory.get_cache_by_id(7).unwrap();
        assert_eq!(numeric.get("k"), None);
        assert_eq!(factory.get_cache("007").unwrap().get("k"), Some(json!("v")));
    }

    #[test]
    fn test_each_call_returns_fresh_stats() {
        let factory = memory_factory();
        let first = factory.get_cache("3").unwrap();
        first.get("missing");

        let second = factory.get_cache("3").unwrap();
        assert_eq!(second.stats().misses, 0);
    }

    #[test]
    fn test_from_config_disabled_backend() {
        let (dispatcher, _queue) = tasks::channel();
        let config = Config {
            backend: BackendKind::Disabled,
            ..Config::default()
        };

        let factory = CacheFactory::from_config(&config, dispatcher).unwrap();
        assert!(matches!(
            factory.get_cache("1"),
            Err(CacheError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_from_config_applies_sizing() {
        let (dispatcher, _queue) = tasks::channel();
        let config = Config {
            backend: BackendKind::Memory,
            max_size: MaxSize::Entries(10),
            fill_factor: 0.5,
            ..Config::default()
        };

        let store = CacheFactory::from_config(&config, dispatcher)
            .unwrap()
            .get_cache("2")
            .unwrap();
        assert_eq!(store.max_size(), MaxSize::Entries(10));
        assert_eq!(store.fill_factor(), 0.5);
    }
}
