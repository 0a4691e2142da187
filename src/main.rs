//! Cache Storage - namespaced caching over a quota-limited key-value store
//!
//! Serves the per-namespace caches over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_storage::api::{create_router, AppState};
use cache_storage::{spawn_dispatcher, tasks, CacheFactory, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the deferred task dispatcher
/// 4. Open the storage backend and build the cache factory
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, then drain deferred work
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_storage=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache storage server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, data_path={}, quota={}B, max_size={:?}, fill_factor={}, port={}",
        config.backend,
        config.data_path.display(),
        config.quota_bytes,
        config.max_size,
        config.fill_factor,
        config.server_port
    );

    let (dispatcher, queue) = tasks::channel();
    let mut dispatcher_handle = spawn_dispatcher(queue);

    let factory = CacheFactory::from_config(&config, dispatcher)
        .context("failed to open storage backend")?;
    let app = create_router(AppState::new(factory));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router and its dispatchers are gone, so the queue closes once the
    // remaining callbacks and purges have run
    info!("Draining deferred tasks");
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut dispatcher_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("Dispatcher task failed: {}", err),
        Err(_) => {
            warn!("Deferred tasks still running after {:?}, aborting", DRAIN_TIMEOUT);
            dispatcher_handle.abort();
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Upper bound on waiting for deferred tasks at shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
