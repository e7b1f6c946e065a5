//! Reconciles server geofence deltas against the geofence store and monitor.

use super::{GeofenceDataList, GeofenceLocationMap, GeofenceResponseData, LocationKey};
use crate::error::GeofenceError;
use crate::params::TagSet;
use crate::ports::{GeofenceMonitor, GeofenceStore};
use crate::record::SyncTimestamp;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Geofence reconciliation engine.
///
/// The store always holds the full, tag-independent set of valid geofences.
/// The monitor only ever receives the subset matching the subscribed tags.
pub struct GeofenceEngine {
    monitor: Arc<dyn GeofenceMonitor>,
    store: Arc<dyn GeofenceStore>,
}

impl GeofenceEngine {
    pub fn new(monitor: Arc<dyn GeofenceMonitor>, store: Arc<dyn GeofenceStore>) -> Self {
        Self { monitor, store }
    }

    /// Whether the monitor may be used at all.
    pub fn is_permission_granted(&self) -> bool {
        self.monitor.is_permission_granted()
    }

    /// Merge a server delta into the stored set and re-arm the monitor.
    ///
    /// A `NEVER` timestamp marks a cold start: monitor and store are reset
    /// before anything is armed, and the stored set is not used as a base.
    /// Without a delta, a cold start resets both and anything else is a no-op.
    #[instrument(skip(self, delta, subscribed_tags), fields(cold_start = sync_timestamp.is_never()))]
    pub async fn process_response_data(
        &self,
        sync_timestamp: SyncTimestamp,
        delta: Option<&GeofenceResponseData>,
        subscribed_tags: &TagSet,
    ) -> Result<(), GeofenceError> {
        let cold_start = sync_timestamp.is_never();

        let Some(delta) = delta else {
            if cold_start {
                info!("No geofence baseline and no delta, clearing monitor and store");
                self.reset_monitor_and_store().await?;
            } else {
                debug!("No geofence delta, keeping existing baseline");
            }
            return Ok(());
        };

        let base = if cold_start {
            self.reset_monitor_and_store().await?;
            GeofenceDataList::new()
        } else {
            self.store.currently_registered_geofences().await?
        };

        let merged = base.merged(delta).culled(Utc::now());
        debug!(
            received = delta.geofences.len(),
            deleted = delta.deleted_geofence_ids.len(),
            kept = merged.len(),
            "Geofence delta merged"
        );

        self.store.save_registered_geofences(&merged).await?;
        self.arm(&merged, subscribed_tags).await
    }

    /// Remove individual locations from the stored set.
    ///
    /// Geofences left without locations are dropped. The reduced set is
    /// persisted and re-armed; the monitor is never reset.
    #[instrument(skip_all, fields(locations = locations.len()))]
    pub async fn clear_locations(
        &self,
        locations: &GeofenceLocationMap,
        subscribed_tags: &TagSet,
    ) -> Result<(), GeofenceError> {
        if locations.is_empty() {
            return Ok(());
        }

        let stored = self.store.currently_registered_geofences().await?;
        let reduced: GeofenceDataList = stored
            .iter()
            .filter_map(|geofence| {
                let mut remaining = geofence.clone();
                remaining.locations = geofence
                    .locations
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !locations.contains(&LocationKey::new(geofence.id, *index)))
                    .map(|(_, location)| location.clone())
                    .collect();
                (!remaining.locations.is_empty()).then_some(remaining)
            })
            .collect();

        info!(
            before = stored.len(),
            after = reduced.len(),
            "Cleared geofence locations"
        );

        self.store.save_registered_geofences(&reduced).await?;
        self.arm(&reduced, subscribed_tags).await
    }

    /// Re-arm the monitor from the stored set without touching the store.
    #[instrument(skip_all)]
    pub async fn reregister_current_locations(
        &self,
        subscribed_tags: &TagSet,
    ) -> Result<(), GeofenceError> {
        let stored = self.store.currently_registered_geofences().await?;
        self.arm(&stored, subscribed_tags).await
    }

    /// Clear the store only.
    pub async fn reset_store(&self) -> Result<(), GeofenceError> {
        self.store.reset().await?;
        debug!("Geofence store reset");
        Ok(())
    }

    /// Disarm the monitor and clear the store.
    pub async fn reset_monitor_and_store(&self) -> Result<(), GeofenceError> {
        self.monitor.reset().await?;
        self.store.reset().await?;
        debug!("Geofence monitor and store reset");
        Ok(())
    }

    async fn arm(
        &self,
        geofences: &GeofenceDataList,
        subscribed_tags: &TagSet,
    ) -> Result<(), GeofenceError> {
        let armed = geofences.subscribed(subscribed_tags);
        let location_map = GeofenceLocationMap::from_list(&armed);
        info!(
            geofences = armed.len(),
            locations = location_map.len(),
            "Arming geofences"
        );
        self.monitor.register_geofences(&location_map, &armed).await
    }
}
