//! # lovewall-server
//!
//! HTTP backend for the love wall.
//!
//! This binary provides:
//! - **Message wall**: list and post short confessions (`/api/love`)
//! - **Photo album**: list, upload and delete photos (`/api/album`)
//! - **Static hosting** of uploaded photos under `/uploads` and of the
//!   pre-built frontend for every other path
//!
//! All state lives in two JSON files and an upload directory; see
//! [`lovewall_store`] for the storage rules.

mod api;
mod config;
mod error;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use lovewall_store::{ImageStore, RecordStore};

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lovewall_server=debug,tower_http=info")),
        )
        .init();

    info!("Starting love wall server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage (creates directories and empty data files if missing)
    // -----------------------------------------------------------------------
    let records = Arc::new(RecordStore::open(config.data_dir.clone()).await?);
    let images = Arc::new(ImageStore::new(config.upload_dir.clone(), config.max_image_size).await?);

    if let Some(public_dir) = &config.public_dir {
        if !public_dir.is_dir() {
            tracing::warn!(
                path = %public_dir.display(),
                "Public directory not found, frontend will not be served"
            );
        }
    }

    let http_addr = config.http_addr;
    let app_state = AppState {
        records,
        images,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
