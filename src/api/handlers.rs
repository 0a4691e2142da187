//! API Handlers
//!
//! HTTP request handlers over the per-namespace cache stores.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::sync::RwLock;

use crate::cache::{CacheFactory, CacheStore};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, KeysResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// Stores are opened through the factory on first use and kept here so
/// each namespace has exactly one store (and one set of statistics).
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<CacheFactory>,
    caches: Arc<RwLock<HashMap<String, CacheStore>>>,
}

impl AppState {
    /// Creates a new AppState around the given factory.
    pub fn new(factory: CacheFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            caches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the store for `namespace`, opening it if needed.
    pub async fn cache(&self, namespace: &str) -> Result<CacheStore> {
        if let Some(store) = self.caches.read().await.get(namespace) {
            return Ok(store.clone());
        }

        let mut caches = self.caches.write().await;
        if let Some(store) = caches.get(namespace) {
            return Ok(store.clone());
        }
        let store = self.factory.get_cache(namespace)?;
        caches.insert(namespace.to_string(), store.clone());
        Ok(store)
    }
}

/// Runs a store operation on the blocking pool, since backends may do
/// synchronous file I/O.
async fn run_blocking<T, F>(cache: CacheStore, op: F) -> Result<T>
where
    F: FnOnce(&CacheStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&cache))
        .await
        .map_err(|e| CacheError::BackendUnavailable(format!("storage task failed: {}", e)))?
}

/// Handler for PUT /cache/:namespace/:key
pub async fn set_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let cache = state.cache(&namespace).await?;
    let policy = req.entry_policy();
    let stored = key.clone();
    run_blocking(cache, move |cache| cache.set(&stored, &req.value, policy)).await?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /cache/:namespace/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let cache = state.cache(&namespace).await?;
    let lookup = key.clone();
    let value = run_blocking(cache, move |cache| Ok(cache.get(&lookup)))
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(namespace, key, value)))
}

/// Handler for DELETE /cache/:namespace/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let cache = state.cache(&namespace).await?;
    let target = key.clone();
    let value = run_blocking(cache, move |cache| cache.remove(&target))
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(DeleteResponse::new(key, value)))
}

/// Handler for DELETE /cache/:namespace
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<ClearResponse>> {
    let cache = state.cache(&namespace).await?;
    run_blocking(cache, |cache| cache.clear()).await?;

    Ok(Json(ClearResponse::new(namespace)))
}

/// Handler for GET /keys/:namespace
pub async fn keys_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<KeysResponse>> {
    let cache = state.cache(&namespace).await?;
    let keys: Vec<String> =
        run_blocking(cache, |cache| Ok(cache.keys().into_iter().collect())).await?;

    Ok(Json(KeysResponse::new(namespace, keys)))
}

/// Handler for GET /stats/:namespace
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<StatsResponse>> {
    let cache = state.cache(&namespace).await?;
    let (stats, size) = run_blocking(cache, |cache| Ok((cache.stats(), cache.size()))).await?;

    Ok(Json(StatsResponse::new(namespace, stats, size)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
