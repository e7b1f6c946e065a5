//! Platform stand-ins for a headless host: a push provider with a fixed token
//! and a geofence monitor that only records and logs what it was asked to arm.

use async_trait::async_trait;
use push_engine::ports::{GeofenceMonitor, PushProvider};
use push_engine::{GeofenceDataList, GeofenceError, GeofenceLocationMap, GeofenceRegion, ProviderError};
use secrecy::{ExposeSecret, SecretString};
use std::sync::RwLock;
use tracing::{debug, info};

/// Push provider that hands out a preconfigured token.
pub struct StaticPushProvider {
    token: Option<SecretString>,
}

impl StaticPushProvider {
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: token.filter(|t| !t.expose_secret().trim().is_empty()),
        }
    }
}

#[async_trait]
impl PushProvider for StaticPushProvider {
    fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn register(&self, sender_identity: &str) -> Result<String, ProviderError> {
        debug!(sender_identity = %sender_identity, "Issuing static platform token");
        self.token
            .as_ref()
            .map(|t| t.expose_secret().clone())
            .ok_or_else(|| ProviderError::new("no platform token configured"))
    }

    async fn unregister(&self) -> Result<(), ProviderError> {
        debug!("Static platform token released");
        Ok(())
    }
}

/// Geofence monitor that keeps the armed regions in memory.
pub struct LoggingGeofenceMonitor {
    permission_granted: bool,
    armed: RwLock<Vec<GeofenceRegion>>,
}

impl LoggingGeofenceMonitor {
    pub fn new(permission_granted: bool) -> Self {
        Self {
            permission_granted,
            armed: RwLock::new(Vec::new()),
        }
    }

    /// Regions armed by the most recent registration.
    pub fn armed(&self) -> Vec<GeofenceRegion> {
        self.armed
            .read()
            .map(|armed| armed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GeofenceMonitor for LoggingGeofenceMonitor {
    fn is_permission_granted(&self) -> bool {
        self.permission_granted
    }

    async fn register_geofences(
        &self,
        locations: &GeofenceLocationMap,
        _geofences: &GeofenceDataList,
    ) -> Result<(), GeofenceError> {
        for region in locations.regions() {
            info!(
                request_id = %region.request_id,
                latitude = region.latitude,
                longitude = region.longitude,
                radius = region.radius,
                trigger = ?region.trigger_type,
                expiry = %region.expiry,
                "Arming geofence region"
            );
        }

        let mut armed = self
            .armed
            .write()
            .map_err(|_| GeofenceError::Monitor("armed region list poisoned".into()))?;
        *armed = locations.regions().cloned().collect();
        Ok(())
    }

    async fn reset(&self) -> Result<(), GeofenceError> {
        let mut armed = self
            .armed
            .write()
            .map_err(|_| GeofenceError::Monitor("armed region list poisoned".into()))?;
        info!(count = armed.len(), "Disarming all geofence regions");
        armed.clear();
        Ok(())
    }
}
