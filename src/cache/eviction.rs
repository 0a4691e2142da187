//! Eviction Engine
//!
//! Brings a namespace down to its fill target: expired entries go first,
//! then the lowest-ranked survivors by priority, then recency.

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::cache::{is_expired, CacheEntry, CacheStore, MaxSize};

// == Purge Report ==
/// What one purge pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub expired: usize,
    pub evicted: usize,
}

// == Purge Size ==
/// Number of entries to retain after a purge.
///
/// Bounded stores shrink to `max * fill_factor`; unbounded stores shrink
/// relative to their current occupancy.
pub fn purge_size(max_size: MaxSize, current: usize, fill_factor: f64) -> usize {
    let basis = match max_size {
        MaxSize::Entries(max) => max,
        MaxSize::Unbounded => current,
    };
    (basis as f64 * fill_factor).round() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rank {
    priority: i32,
    last_accessed: i64,
}

// == Candidate ==
/// A live entry competing to survive a purge.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub key: String,
    /// `None` for records without policy data or that failed to decode
    rank: Option<Rank>,
}

impl Candidate {
    pub fn from_entry(key: String, entry: &CacheEntry) -> Self {
        let rank = entry.priority().map(|priority| Rank {
            priority,
            last_accessed: entry.last_accessed,
        });
        Self { key, rank }
    }

    pub fn malformed(key: String) -> Self {
        Self { key, rank: None }
    }
}

/// Survivors first: priority descending, then most recently used.
/// Malformed candidates sort last and are therefore evicted first.
fn survival_order(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.rank, b.rank) {
        (Some(a), Some(b)) => b
            .priority
            .cmp(&a.priority)
            .then(b.last_accessed.cmp(&a.last_accessed)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts `candidates` so the tail holds the first victims. Stable.
pub(crate) fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(survival_order);
}

// == Purge ==
/// Runs one purge pass over `store`. Never fails: a record that cannot be
/// removed is logged and skipped.
///
/// The retain target is computed once, from the occupancy before expired
/// entries are dropped.
pub(crate) fn purge(store: &CacheStore) -> PurgeReport {
    let now = store.now_ms();
    let keys = store.keys();
    let target = purge_size(store.max_size(), keys.len(), store.fill_factor());
    let mut report = PurgeReport::default();
    let mut candidates = Vec::with_capacity(keys.len());

    for key in keys {
        match store.load(&key) {
            Ok(Some(entry)) if is_expired(&entry, now) => match store.remove(&key) {
                Ok(_) => report.expired += 1,
                Err(err) => warn!(namespace = store.namespace(), key = %key, "Failed to remove expired entry: {}", err),
            },
            Ok(Some(entry)) => candidates.push(Candidate::from_entry(key, &entry)),
            Ok(None) => debug!(namespace = store.namespace(), key = %key, "Entry vanished during purge"),
            Err(err) => {
                debug!(namespace = store.namespace(), key = %key, "Unreadable entry: {}", err);
                candidates.push(Candidate::malformed(key));
            }
        }
    }

    if candidates.len() > target {
        rank_candidates(&mut candidates);
        while candidates.len() > target {
            let Some(victim) = candidates.pop() else {
                break;
            };
            match store.remove(&victim.key) {
                Ok(_) => report.evicted += 1,
                Err(err) => warn!(namespace = store.namespace(), key = %victim.key, "Failed to evict entry: {}", err),
            }
        }
    }

    info!(
        namespace = store.namespace(),
        target,
        expired = report.expired,
        evicted = report.evicted,
        "Purged cache"
    );
    report
}
