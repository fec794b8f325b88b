use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{now_display, AlbumEntry};

/// Fallback base name when the declared file name has nothing usable.
const FALLBACK_BASE: &str = "image";

/// Keep only the final path component of a client-supplied file name and
/// replace anything outside `[alnum . - _]`.
fn sanitize_base(declared: &str) -> String {
    let base = declared
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        FALLBACK_BASE.to_string()
    } else {
        cleaned
    }
}

/// Reject stored names that could escape the upload directory.
fn check_stored_name(filename: &str) -> Result<()> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None)
            if !filename.contains('/') && !filename.contains('\\') =>
        {
            Ok(())
        }
        _ => Err(StoreError::Validation(format!(
            "Invalid image file name: {filename:?}"
        ))),
    }
}

/// On-disk store for uploaded photos.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::write(&base_path, e))?;

        info!(path = %base_path.display(), max_size, "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Resolve a stored file name inside the upload directory.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf> {
        check_stored_name(filename)?;
        Ok(self.base_path.join(filename))
    }

    /// Validate and store one uploaded image, returning the album record
    /// that references it.  The record is not persisted here.
    pub async fn accept_upload(
        &self,
        data: &[u8],
        declared_mime: &str,
        declared_name: &str,
    ) -> Result<AlbumEntry> {
        if !declared_mime.to_ascii_lowercase().starts_with("image/") {
            return Err(StoreError::Validation(format!(
                "Only image files can be uploaded (got {declared_mime:?})"
            )));
        }
        if data.is_empty() {
            return Err(StoreError::Validation("Uploaded image is empty".to_string()));
        }
        if data.len() > self.max_size {
            return Err(StoreError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let base = sanitize_base(declared_name);
        let stamp = Utc::now().timestamp_millis();

        let filename = format!("{stamp}-{base}");
        let filename = match self.write_new(&filename, data).await {
            Ok(()) => filename,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let token = Uuid::new_v4().simple().to_string();
                let retry = format!("{stamp}-{}-{base}", &token[..8]);
                self.write_new(&retry, data)
                    .await
                    .map_err(|e| StoreError::write(self.base_path.join(&retry), e))?;
                retry
            }
            Err(e) => return Err(StoreError::write(self.base_path.join(&filename), e)),
        };

        debug!(filename = %filename, size = data.len(), mime = %declared_mime, "Stored image");
        Ok(AlbumEntry::new(filename, now_display()))
    }

    /// Delete a stored image.  An already missing file is not an error.
    pub async fn remove(&self, filename: &str) -> Result<()> {
        let path = self.path_for(filename)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(filename = %filename, "Deleted image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(filename = %filename, "Image already gone");
                Ok(())
            }
            Err(e) => Err(StoreError::write(path, e)),
        }
    }

    async fn write_new(&self, filename: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.base_path.join(filename);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if written.is_err() {
            drop(file);
            let _ = fs::remove_file(&path).await;
        }
        written
    }
}
