//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache stores, the factory and the HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Write attempted with an empty key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Namespace is not a positive integer-like identifier
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// No persistent key-value backend is configured
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Capacity error survived one purge-and-retry
    #[error("Storage full: {0}")]
    StorageFull(String),

    /// Any non-capacity persistence failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not present (HTTP lookups only)
    #[error("Key not found: {0}")]
    NotFound(String),
}

impl CacheError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::InvalidKey(_) | CacheError::InvalidNamespace(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::StorageFull(_) => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CacheError::InvalidKey("".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CacheError::InvalidNamespace("abc".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CacheError::BackendUnavailable("none".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            CacheError::StorageFull("k".into()).status_code(),
            StatusCode::INSUFFICIENT_STORAGE
        );
        assert_eq!(
            CacheError::NotFound("k".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = CacheError::StorageFull("key 'a' after purge".into());
        assert_eq!(err.to_string(), "Storage full: key 'a' after purge");
    }
}
