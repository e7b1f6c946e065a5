//! Fetches geofence deltas and feeds them to the geofence engine.

use super::GeofenceEngine;
use crate::error::GeofenceError;
use crate::params::Credentials;
use crate::ports::{GeofenceUpdateApi, PreferencesStore};
use crate::record::{RecordField, RecordPatch, SyncTimestamp};
use std::sync::Arc;
use tracing::{info, instrument};

/// Drives geofence syncs and keeps the last-update timestamp in the record.
pub struct GeofenceUpdater {
    api: Arc<dyn GeofenceUpdateApi>,
    engine: Arc<GeofenceEngine>,
    preferences: Arc<dyn PreferencesStore>,
}

impl GeofenceUpdater {
    pub fn new(
        api: Arc<dyn GeofenceUpdateApi>,
        engine: Arc<GeofenceEngine>,
        preferences: Arc<dyn PreferencesStore>,
    ) -> Self {
        Self {
            api,
            engine,
            preferences,
        }
    }

    pub fn engine(&self) -> &Arc<GeofenceEngine> {
        &self.engine
    }

    /// Fetch everything that changed since `since` and reconcile it.
    ///
    /// The record's last-update timestamp only advances when the server
    /// returned a delta and the engine processed it.
    #[instrument(skip(self, credentials))]
    pub async fn start_update(
        &self,
        credentials: &Credentials,
        since: SyncTimestamp,
    ) -> Result<(), GeofenceError> {
        let record = self.preferences.load().await?;
        let backend_id = record.backend_id.ok_or(GeofenceError::NotRegistered)?;

        let response = self
            .api
            .fetch_geofence_update(credentials, &backend_id, since)
            .await?;

        self.engine
            .process_response_data(since, response.as_ref(), &record.tags)
            .await?;

        if let Some(response) = response {
            self.preferences
                .apply(
                    RecordPatch::new()
                        .set(RecordField::LastGeofenceUpdate(response.last_modified)),
                )
                .await?;
            info!(last_modified = %response.last_modified, "Geofence update complete");
        }
        Ok(())
    }

    /// Fetch the delta since the stored timestamp, e.g. when the server
    /// signals that geofences changed.
    pub async fn refresh(&self, credentials: &Credentials) -> Result<(), GeofenceError> {
        let since = self.preferences.load().await?.last_geofence_update;
        self.start_update(credentials, since).await
    }

    /// Disarm and forget all geofences.
    pub async fn clear_from_monitor_and_store(&self) -> Result<(), GeofenceError> {
        self.engine.reset_monitor_and_store().await?;
        self.reset_timestamp().await
    }

    /// Forget all stored geofences without touching the monitor.
    pub async fn clear_from_store_only(&self) -> Result<(), GeofenceError> {
        self.engine.reset_store().await?;
        self.reset_timestamp().await
    }

    async fn reset_timestamp(&self) -> Result<(), GeofenceError> {
        self.preferences
            .apply(RecordPatch::new().set(RecordField::LastGeofenceUpdate(SyncTimestamp::NEVER)))
            .await?;
        Ok(())
    }
}
