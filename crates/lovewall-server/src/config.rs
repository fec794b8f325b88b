//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the wall can start with zero
//! configuration from the directory holding its `public/` frontend.

use std::net::SocketAddr;
use std::path::PathBuf;

use lovewall_store::MAX_IMAGE_SIZE;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server.
    /// Env: `HTTP_ADDR`, with `PORT` overriding just the port.
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Directory holding `loveData.json` and `albumData.json`.
    /// Env: `DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Directory where uploaded photos are stored and served from.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Pre-built frontend assets served for every non-API path.
    /// Env: `PUBLIC_DIR` (empty disables static hosting)
    /// Default: `./public`
    pub public_dir: Option<PathBuf>,

    /// Maximum accepted image size in bytes.
    /// Env: `MAX_IMAGE_SIZE`
    /// Default: 10 MiB
    pub max_image_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 3000).into(),
            data_dir: PathBuf::from("./data"),
            upload_dir: PathBuf::from("./uploads"),
            public_dir: Some(PathBuf::from("./public")),
            max_image_size: MAX_IMAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, ignoring"),
            }
        }

        if let Some(path) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(path);
        }

        if let Some(path) = var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Some(path) = var("PUBLIC_DIR") {
            config.public_dir = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(val) = var("MAX_IMAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_image_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_IMAGE_SIZE, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
