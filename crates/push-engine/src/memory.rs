//! In-memory stores, for tests or when persistence is disabled.

use crate::error::StoreError;
use crate::geofence::GeofenceDataList;
use crate::ports::{GeofenceStore, PreferencesStore};
use crate::record::{RecordPatch, RegistrationRecord};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Preferences kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryPreferencesStore {
    record: RwLock<RegistrationRecord>,
}

impl MemoryPreferencesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_record(record: RegistrationRecord) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }
}

#[async_trait]
impl PreferencesStore for MemoryPreferencesStore {
    async fn load(&self) -> Result<RegistrationRecord, StoreError> {
        Ok(self.record.read().await.clone())
    }

    async fn apply(&self, patch: RecordPatch) -> Result<(), StoreError> {
        let mut record = self.record.write().await;
        record.apply(&patch);
        debug!(fields = patch.fields().len(), "Memory preferences: patch applied");
        Ok(())
    }
}

/// Geofences kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryGeofenceStore {
    geofences: RwLock<GeofenceDataList>,
}

impl MemoryGeofenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geofences(geofences: GeofenceDataList) -> Self {
        Self {
            geofences: RwLock::new(geofences),
        }
    }
}

#[async_trait]
impl GeofenceStore for MemoryGeofenceStore {
    async fn currently_registered_geofences(&self) -> Result<GeofenceDataList, StoreError> {
        Ok(self.geofences.read().await.clone())
    }

    async fn save_registered_geofences(
        &self,
        geofences: &GeofenceDataList,
    ) -> Result<(), StoreError> {
        *self.geofences.write().await = geofences.clone();
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        *self.geofences.write().await = GeofenceDataList::new();
        Ok(())
    }
}
