//! Cache Storage - namespaced caching over a quota-limited key-value store
//!
//! Provides per-namespace caches with absolute and sliding expiration,
//! priority/recency eviction when the backend fills up, and hit/miss
//! statistics, plus a small REST surface.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheFactory, CacheStore, EntryPolicy, Priority};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_dispatcher;
