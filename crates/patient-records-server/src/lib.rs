//! HTTP service for the patient record store.
//!
//! The binary stays thin: it installs logging, reads [`ServerConfig`] from the
//! environment, and hands off to [`run`]. Tests drive [`serve`] directly on an
//! ephemeral listener.

pub mod config;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use patient_records_core::RecordStore;
use tokio::net::TcpListener;
use tracing::info;

pub use config::{ServerConfig, StorageLocation};
pub use routes::{router, ApiResponse, SharedStore};

/// Open the record store described by the configuration.
pub fn open_store(config: &ServerConfig) -> Result<RecordStore> {
    let store = match &config.storage {
        StorageLocation::InMemory => RecordStore::open_in_memory(),
        StorageLocation::File(path) => RecordStore::open(path, config.busy_timeout),
    }
    .with_context(|| format!("failed to open record store at {}", config.storage))?;
    Ok(store)
}

/// Serve the API on an already bound listener until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, store: SharedStore, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(store);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

/// Open storage, bind the configured address, and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<()> {
    info!(
        storage = %config.storage,
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        "opening record store"
    );
    let store = Arc::new(open_store(&config)?);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %listener.local_addr()?, "patient records API listening under /api");

    serve(listener, store, shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
