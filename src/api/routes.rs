//! API Routes
//!
//! Configures the Axum router with all cache endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, keys_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache/:namespace/:key` - Store a value with an optional policy
/// - `GET /cache/:namespace/:key` - Retrieve a live value
/// - `DELETE /cache/:namespace/:key` - Remove a key
/// - `DELETE /cache/:namespace` - Remove every key in a namespace
/// - `GET /keys/:namespace` - List keys in a namespace
/// - `GET /stats/:namespace` - Get namespace statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:namespace/:key",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route("/cache/:namespace", delete(clear_handler))
        .route("/keys/:namespace", get(keys_handler))
        .route("/stats/:namespace", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::CacheFactory;
    use crate::tasks;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app(with_backend: bool) -> Router {
        let (dispatcher, _queue) = tasks::channel();
        let backend = if with_backend {
            Some(Arc::new(MemoryBackend::new()) as Arc<dyn crate::backend::StorageBackend>)
        } else {
            None
        };
        create_router(AppState::new(CacheFactory::new(backend, dispatcher)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app(true);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app(true);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/1/test")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app(true);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/1/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_namespace_is_bad_request() {
        let app = create_test_app(true);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/keys/not-a-number")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_backend_is_unavailable() {
        let app = create_test_app(false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
