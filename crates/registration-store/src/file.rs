//! JSON documents on disk, replaced atomically.

use push_engine::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// A single JSON document at a fixed path.
#[derive(Debug, Clone)]
pub(crate) struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, or the default value if the file doesn't exist.
    pub async fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?self.path, "Store file not found, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_slice(&data)?;
        debug!(path = ?self.path, bytes = data.len(), "Loaded store file");
        Ok(value)
    }

    /// Write the document. Readers see either the old or the new content.
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(path = ?self.path, bytes = data.len(), "Saved store file");
        Ok(())
    }

    /// Delete the document. A missing file is not an error.
    pub async fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
