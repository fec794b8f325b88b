use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Caller input failed a precondition (empty content, non-image upload).
    #[error("{0}")]
    Validation(String),

    /// An album position outside the current sequence.
    #[error("No album entry at position {position} (album has {len} entries)")]
    NotFound { position: i64, len: usize },

    /// Uploaded payload exceeds the configured limit.
    #[error("Image too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A data file exists but could not be read or parsed.
    #[error("Failed to read {}: {source}", path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A data file or stored image could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        StoreError::StorageRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        StoreError::StorageWrite {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
