//! Expiration Policy
//!
//! Decides whether an entry is stale at a given moment.

use crate::cache::CacheEntry;

// == Is Expired ==
/// Checks whether `entry` is stale at `now_ms`.
///
/// Absolute and sliding expiration are independent; whichever fires first
/// wins. The absolute deadline is inclusive (`now >= deadline`), the sliding
/// window is exclusive (`last_accessed + window < now`). Entries without a
/// policy never expire.
pub fn is_expired(entry: &CacheEntry, now_ms: i64) -> bool {
    let Some(policy) = entry.policy.as_ref() else {
        return false;
    };

    if let Some(deadline) = policy.expiration_absolute {
        if now_ms >= deadline {
            return true;
        }
    }

    if let Some(seconds) = policy.expiration_sliding {
        let window_ms = i64::try_from(seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        if entry.last_accessed.saturating_add(window_ms) < now_ms {
            return true;
        }
    }

    false
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryPolicy;
    use serde_json::json;

    fn entry_with(policy: Option<EntryPolicy>, last_accessed: i64) -> CacheEntry {
        CacheEntry::new("k", json!("v"), policy, last_accessed).unwrap()
    }

    #[test]
    fn test_no_policy_never_expires() {
        let mut entry = entry_with(None, 0);
        entry.policy = None;
        assert!(!is_expired(&entry, i64::MAX));
    }

    #[test]
    fn test_default_policy_never_expires() {
        let entry = entry_with(None, 0);
        assert!(!is_expired(&entry, i64::MAX));
    }

    #[test]
    fn test_absolute_boundary_is_inclusive() {
        let entry = entry_with(Some(EntryPolicy::new().expires_at_ms(1_000)), 0);

        assert!(!is_expired(&entry, 999));
        assert!(is_expired(&entry, 1_000));
        assert!(is_expired(&entry, 1_001));
    }

    #[test]
    fn test_sliding_boundary_is_exclusive() {
        let entry = entry_with(Some(EntryPolicy::new().sliding(10)), 5_000);

        assert!(!is_expired(&entry, 15_000));
        assert!(is_expired(&entry, 15_001));
    }

    #[test]
    fn test_sliding_measured_from_last_access() {
        let mut entry = entry_with(Some(EntryPolicy::new().sliding(1)), 0);
        entry.touch(10_000);

        assert!(!is_expired(&entry, 10_500));
        assert!(is_expired(&entry, 11_001));
    }

    #[test]
    fn test_whichever_fires_first() {
        let policy = EntryPolicy::new().expires_at_ms(2_000).sliding(60);
        let entry = entry_with(Some(policy), 0);
        assert!(is_expired(&entry, 2_000));

        let policy = EntryPolicy::new().expires_at_ms(120_000).sliding(1);
        let entry = entry_with(Some(policy), 0);
        assert!(is_expired(&entry, 1_001));
    }

    #[test]
    fn test_huge_sliding_window_does_not_overflow() {
        let entry = entry_with(Some(EntryPolicy::new().sliding(u64::MAX)), 1);
        assert!(!is_expired(&entry, i64::MAX));
    }
}
