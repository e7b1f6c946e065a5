//! Registered geofence set persisted as a JSON file.

use crate::file::JsonFile;
use async_trait::async_trait;
use push_engine::ports::GeofenceStore;
use push_engine::{GeofenceDataList, StoreError};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

/// File-backed [`GeofenceStore`].
pub struct FileGeofenceStore {
    file: JsonFile,
    // Serializes writers so a reset can't interleave with a save.
    write_lock: Mutex<()>,
}

impl FileGeofenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl GeofenceStore for FileGeofenceStore {
    async fn currently_registered_geofences(&self) -> Result<GeofenceDataList, StoreError> {
        self.file.load().await
    }

    async fn save_registered_geofences(
        &self,
        geofences: &GeofenceDataList,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.file.save(geofences).await?;
        info!(count = geofences.len(), "Saved registered geofences");
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.file.remove().await?;
        info!("Cleared registered geofences");
        Ok(())
    }
}
