//! Capabilities the engines consume. Implementations live in adapter crates.

use crate::error::{BackendError, GeofenceError, ProviderError, StoreError};
use crate::geofence::{GeofenceDataList, GeofenceLocationMap, GeofenceResponseData};
use crate::params::{Credentials, TagSet};
use crate::record::{RecordPatch, RegistrationRecord, SyncTimestamp};
use async_trait::async_trait;
use secrecy::SecretString;

#[cfg(test)]
use mockall::automock;

/// Platform push provider: issues and discards the device push token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Whether the platform push service exists on this device.
    fn is_available(&self) -> bool;

    /// Obtain a token for the given sender identity.
    async fn register(&self, sender_identity: &str) -> Result<String, ProviderError>;

    /// Discard the current token.
    async fn unregister(&self) -> Result<(), ProviderError>;
}

/// Everything the backend needs to create or update a registration.
#[derive(Debug, Clone)]
pub struct RegistrationPayload {
    pub credentials: Credentials,
    pub platform_token: SecretString,
    pub device_alias: Option<String>,
    pub custom_user_id: Option<String>,
    pub subscribe_tags: TagSet,
    pub unsubscribe_tags: TagSet,
    pub package_name: String,
    pub os: String,
    pub os_version: String,
    pub device_manufacturer: String,
    pub device_model: String,
}

/// What the backend returned for a create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendRegistration {
    /// May be absent even on a 2xx response; the engines treat that as failure.
    pub device_uuid: Option<String>,
}

/// Backend registration service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendRegistrationApi: Send + Sync {
    async fn create(&self, payload: &RegistrationPayload)
        -> Result<BackendRegistration, BackendError>;

    async fn update(
        &self,
        backend_id: &str,
        payload: &RegistrationPayload,
    ) -> Result<BackendRegistration, BackendError>;

    async fn delete(&self, backend_id: &str, credentials: &Credentials)
        -> Result<(), BackendError>;
}

/// Fetches geofence deltas from the backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeofenceUpdateApi: Send + Sync {
    /// `Ok(None)` means the server had nothing to report.
    async fn fetch_geofence_update(
        &self,
        credentials: &Credentials,
        backend_id: &str,
        since: SyncTimestamp,
    ) -> Result<Option<GeofenceResponseData>, BackendError>;
}

/// Persisted registration record.
///
/// `apply` must make all fields of a patch visible together or not at all.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn load(&self) -> Result<RegistrationRecord, StoreError>;

    async fn apply(&self, patch: RecordPatch) -> Result<(), StoreError>;
}

/// The device's location-monitoring subsystem.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeofenceMonitor: Send + Sync {
    /// Whether the application may monitor locations.
    fn is_permission_granted(&self) -> bool;

    /// Replace the armed regions with `location_map`. `geofences` is the
    /// geofence list the map was projected from.
    async fn register_geofences(
        &self,
        location_map: &GeofenceLocationMap,
        geofences: &GeofenceDataList,
    ) -> Result<(), GeofenceError>;

    /// Disarm everything.
    async fn reset(&self) -> Result<(), GeofenceError>;
}

/// Persisted geofence set.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeofenceStore: Send + Sync {
    async fn currently_registered_geofences(&self) -> Result<GeofenceDataList, StoreError>;

    async fn save_registered_geofences(&self, geofences: &GeofenceDataList)
        -> Result<(), StoreError>;

    async fn reset(&self) -> Result<(), StoreError>;
}
