//! Dash Cache - client-side data cache with request deduplication
//!
//! Runs the cache as a sidecar: an admin API for inspection and
//! invalidation, plus a `/fetch` passthrough to the upstream API that is
//! cached and deduplicated.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dash_cache::api::{create_router, AppState};
use dash_cache::cache::{CacheManager, SystemClock};
use dash_cache::config::Config;
use dash_cache::network::HttpTransport;
use dash_cache::persistence::{FileStorage, KeyValueStore};
use dash_cache::tasks::{spawn_metrics_reporter, spawn_sweeper};

/// Main entry point for the Dash Cache sidecar.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open durable storage and restore the cache
/// 4. Start the expiry sweeper and metrics reporter
/// 5. Build the upstream transport and the router
/// 6. Serve until SIGINT/SIGTERM, then flush to storage
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info", can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dash_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dash Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={:?}, default_ttl={}ms, port={}, sweep_interval={}s",
        config.cache.capacity,
        config.cache.default_ttl.as_millis(),
        config.server_port,
        config.cache.sweep_interval.as_secs()
    );

    let storage = open_storage(&config);
    let cache = CacheManager::with_parts(config.cache.clone(), storage, Arc::new(SystemClock))
        .await
        .context("invalid cache configuration")?;
    info!(entries = cache.len(), persistence = cache.persistence_active(), "Cache initialized");

    let sweeper = spawn_sweeper(cache.clone(), config.cache.sweep_interval);
    let reporter = spawn_metrics_reporter(cache.clone(), config.metrics_interval);
    info!("Background tasks started");

    let transport = HttpTransport::new(Some(config.upstream_url.clone()), config.cache.request_timeout)
        .context("failed to build HTTP client")?;
    let app = create_router(AppState::new(cache.clone(), Arc::new(transport)));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.stop();
    reporter.stop();
    cache.flush().await;
    info!("Server shutdown complete");
    Ok(())
}

/// File storage under `CACHE_DIR`, or memory-only when unset or unusable.
fn open_storage(config: &Config) -> Option<Arc<dyn KeyValueStore>> {
    let dir = config.cache_dir.as_ref()?;
    match FileStorage::open(dir) {
        Ok(storage) => {
            info!(dir = %dir.display(), "Persisting cache to disk");
            Some(Arc::new(storage))
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "Storage unavailable, running memory-only");
            None
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
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
                warn!(error = %err, "Failed to install SIGTERM handler");
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
