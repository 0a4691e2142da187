//! Cache Entry Module
//!
//! Defines the record persisted per key and its expiration/priority policy.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Priority ==
/// Named eviction priorities. Any integer is accepted by [`EntryPolicy`];
/// comparisons are purely numeric and higher survives longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 4,
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority as i32
    }
}

fn default_priority() -> i32 {
    Priority::Normal.into()
}

/// Invoked with `(key, value)` after an entry leaves the cache.
pub type EvictCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

// == Entry Policy ==
/// Per-entry expiration and eviction settings.
///
/// The callback is process-local and never serialized.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPolicy {
    /// Unix milliseconds at which the entry goes stale
    #[serde(default)]
    pub expiration_absolute: Option<i64>,
    /// Seconds of inactivity after which the entry goes stale
    #[serde(default)]
    pub expiration_sliding: Option<u64>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(skip)]
    pub on_evict: Option<EvictCallback>,
}

impl EntryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire at a calendar moment, normalized to Unix milliseconds.
    pub fn expires_at<Tz: TimeZone>(mut self, moment: DateTime<Tz>) -> Self {
        self.expiration_absolute = Some(moment.timestamp_millis());
        self
    }

    /// Expire at the given Unix millisecond timestamp.
    pub fn expires_at_ms(mut self, deadline_ms: i64) -> Self {
        self.expiration_absolute = Some(deadline_ms);
        self
    }

    /// Expire after `seconds` without a read.
    pub fn sliding(mut self, seconds: u64) -> Self {
        self.expiration_sliding = Some(seconds);
        self
    }

    pub fn priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(callback));
        self
    }
}

impl Default for EntryPolicy {
    fn default() -> Self {
        Self {
            expiration_absolute: None,
            expiration_sliding: None,
            priority: default_priority(),
            on_evict: None,
        }
    }
}

impl fmt::Debug for EntryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPolicy")
            .field("expiration_absolute", &self.expiration_absolute)
            .field("expiration_sliding", &self.expiration_sliding)
            .field("priority", &self.priority)
            .field("on_evict", &self.on_evict.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

// == Cache Entry ==
/// The record stored under one physical key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    /// `None` only for records written by something other than this crate
    #[serde(default)]
    pub policy: Option<EntryPolicy>,
    /// Unix milliseconds of the last write or successful read
    pub last_accessed: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry accessed at `now_ms`.
    ///
    /// A missing policy becomes the default one (never expires, normal priority).
    pub fn new(
        key: impl Into<String>,
        value: Value,
        policy: Option<EntryPolicy>,
        now_ms: i64,
    ) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::InvalidKey(
                "Key cannot be null or empty".to_string(),
            ));
        }

        Ok(Self {
            key,
            value,
            policy: Some(policy.unwrap_or_default()),
            last_accessed: now_ms,
        })
    }

    /// Marks the entry as read at `now_ms`.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_accessed = self.last_accessed.max(now_ms);
    }

    pub fn priority(&self) -> Option<i32> {
        self.policy.as_ref().map(|p| p.priority)
    }

    pub fn evict_callback(&self) -> Option<EvictCallback> {
        self.policy.as_ref().and_then(|p| p.on_evict.clone())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use serde_json::json;

    #[test]
    fn test_entry_creation_defaults_policy() {
        let entry = CacheEntry::new("k", json!("v"), None, 42).unwrap();

        assert_eq!(entry.key, "k");
        assert_eq!(entry.value, json!("v"));
        assert_eq!(entry.last_accessed, 42);
        assert_eq!(entry.priority(), Some(2));
        assert!(entry.evict_callback().is_none());
    }

    #[test]
    fn test_entry_empty_key_rejected() {
        let result = CacheEntry::new("", json!(1), None, 0);
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_expires_at_normalizes_any_timezone() {
        let utc = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let plus_two = utc.with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());

        let a = EntryPolicy::new().expires_at(utc);
        let b = EntryPolicy::new().expires_at(plus_two);

        assert_eq!(a.expiration_absolute, Some(utc.timestamp_millis()));
        assert_eq!(a.expiration_absolute, b.expiration_absolute);
    }

    #[test]
    fn test_priority_accepts_named_and_raw() {
        assert_eq!(EntryPolicy::new().priority(Priority::High).priority, 4);
        assert_eq!(EntryPolicy::new().priority(7).priority, 7);
        assert_eq!(EntryPolicy::new().priority, 2);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut entry = CacheEntry::new("k", json!(1), None, 100).unwrap();
        entry.touch(50);
        assert_eq!(entry.last_accessed, 100);
        entry.touch(150);
        assert_eq!(entry.last_accessed, 150);
    }

    #[test]
    fn test_record_format_is_camel_case_and_skips_callback() {
        let policy = EntryPolicy::new()
            .expires_at_ms(5_000)
            .sliding(30)
            .priority(Priority::Low)
            .on_evict(|_, _| {});
        let entry = CacheEntry::new("k", json!({"a": 1}), Some(policy), 1_000).unwrap();

        let record: Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            record,
            json!({
                "key": "k",
                "value": {"a": 1},
                "policy": {
                    "expirationAbsolute": 5_000,
                    "expirationSliding": 30,
                    "priority": 1
                },
                "lastAccessed": 1_000
            })
        );
    }

    #[test]
    fn test_record_without_policy_decodes() {
        let entry: CacheEntry =
            serde_json::from_str(r#"{"key":"k","value":null,"lastAccessed":3}"#).unwrap();
        assert!(entry.policy.is_none());
        assert_eq!(entry.priority(), None);
    }
}
