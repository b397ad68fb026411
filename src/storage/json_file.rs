use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::storage::{Result, StorageError};

/// A single JSON document on disk, rewritten wholesale on every change.
///
/// A missing or empty file reads as `T::default()`. Writes go to a sibling
/// temp file that is renamed over the target, so readers never observe a
/// partial document. Read-modify-write cycles made through [`JsonFile::update`]
/// are serialized within the process.
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document
    pub async fn load(&self) -> Result<T> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, using empty collection", self.path.display());
                return Ok(T::default());
            }
            Err(e) => {
                error!("Failed to read {}: {}", self.path.display(), e);
                return Err(StorageError::Io(format!("{}: {}", self.path.display(), e)));
            }
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(T::default());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            error!("Corrupt JSON in {}: {}", self.path.display(), e);
            StorageError::DeserializationError(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Replace the document on disk
    pub async fn save(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.json".to_string());
        let tmp_path = self
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!(".{}.tmp.{}", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(format!("failed to write temp file: {}", e)));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(format!(
                "failed to rename temp file to {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    /// Load, apply `f`, and write back only if `f` reports a change
    pub async fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> (R, bool),
    {
        let _guard = self.lock.lock().await;
        let mut value = self.load().await?;
        let (result, changed) = f(&mut value);
        if changed {
            self.save(&value).await?;
        }
        Ok(result)
    }
}
