//! Cache Module
//!
//! Namespaced caching over a quota-limited key-value backend, with absolute
//! and sliding expiration and priority/recency eviction.

mod clock;
mod entry;
mod eviction;
mod expiration;
mod factory;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryPolicy, EvictCallback, Priority};
pub use eviction::{purge_size, PurgeReport};
pub use expiration::is_expired;
pub use factory::{validate_namespace, CacheFactory};
pub use stats::CacheStats;
pub use store::{CacheStore, CacheStoreBuilder};

// == Public Constants ==
/// Leading segment of every physical key
pub const KEY_PREFIX: &str = "cache-storage";

/// Fraction of capacity retained after a purge
pub const DEFAULT_FILL_FACTOR: f64 = 0.75;

// == Max Size ==
/// Entry-count ceiling for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxSize {
    /// No ceiling; a purge shrinks relative to current occupancy
    #[default]
    Unbounded,
    /// At most this many entries before a purge is scheduled
    Entries(usize),
}

impl MaxSize {
    /// Interprets the conventional integer form: `-1` (or any value below 1)
    /// means unbounded.
    pub fn from_raw(raw: i64) -> Self {
        match usize::try_from(raw) {
            Ok(n) if n > 0 => MaxSize::Entries(n),
            _ => MaxSize::Unbounded,
        }
    }
}
