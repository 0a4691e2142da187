//! Request DTOs for the cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::EntryPolicy;

/// Request body for `PUT /cache/:namespace/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Any JSON value
    pub value: Value,
    /// Optional expiration and priority settings
    #[serde(default)]
    pub policy: Option<PolicyRequest>,
}

/// Wire form of an entry policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    /// RFC 3339 moment after which the entry is stale
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds of inactivity before the entry is stale
    #[serde(default)]
    pub sliding_expiration: Option<u64>,
    /// Eviction priority, higher survives longer
    #[serde(default)]
    pub priority: Option<i32>,
}

impl SetRequest {
    /// Converts the wire policy into an [`EntryPolicy`].
    pub fn entry_policy(&self) -> Option<EntryPolicy> {
        self.policy.as_ref().map(|req| {
            let mut policy = EntryPolicy::new();
            if let Some(moment) = req.expires_at {
                policy = policy.expires_at(moment);
            }
            if let Some(seconds) = req.sliding_expiration {
                policy = policy.sliding(seconds);
            }
            if let Some(priority) = req.priority {
                policy = policy.priority(priority);
            }
            policy
        })
    }
}
