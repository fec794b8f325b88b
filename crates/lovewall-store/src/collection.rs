//! Whole-file JSON persistence for one ordered collection.
//!
//! The file always holds the complete sequence as a pretty-printed JSON
//! array.  There is no incremental format: [`JsonCollection::save`] rewrites
//! everything, going through a sibling temporary file and a rename so a
//! concurrent reader sees either the old or the new array, never a prefix.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Handle to a JSON array file holding records of type `T`.
#[derive(Debug)]
pub struct JsonCollection<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and an empty array file if absent.
    pub async fn ensure_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::write(parent, e))?;
        }

        match fs::try_exists(&self.path).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!(path = %self.path.display(), "Creating empty data file");
                self.save(&[]).await
            }
            Err(e) => Err(StoreError::read(&self.path, e)),
        }
    }

    /// Read the whole collection.  A missing or blank file is an empty
    /// collection; anything else that is not a JSON array of `T` is an error.
    pub async fn load(&self) -> Result<Vec<T>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::read(&self.path, e)),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&raw).map_err(|e| StoreError::read(&self.path, e))
    }

    /// Replace the file contents with `records`.
    pub async fn save(&self, records: &[T]) -> Result<()> {
        let body =
            serde_json::to_vec_pretty(records).map_err(|e| StoreError::write(&self.path, e))?;

        let tmp = self.tmp_path();
        fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::write(&tmp, e))?;

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::write(&self.path, e));
        }

        debug!(path = %self.path.display(), records = records.len(), "Saved collection");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
