//! Wires the engines to the configured stores, HTTP client and providers.

use crate::config::Config;
use crate::error::AppResult;
use crate::providers::{LoggingGeofenceMonitor, StaticPushProvider};
use anyhow::Context;
use push_api_client::PushApiClient;
use push_engine::memory::{MemoryGeofenceStore, MemoryPreferencesStore};
use push_engine::ports::{GeofenceStore, PreferencesStore};
use push_engine::{
    GeofenceEngine, GeofenceLocationMap, GeofenceUpdater, RegistrationEngine,
    RegistrationParameters, RegistrationRecord, UnregistrationEngine,
};
use registration_store::{FileGeofenceStore, FilePreferencesStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const REDACTED: &str = "[REDACTED]";

/// A fully wired set of engines for one device.
pub struct Agent {
    registration: Arc<RegistrationEngine>,
    unregistration: Arc<UnregistrationEngine>,
    updater: Arc<GeofenceUpdater>,
    preferences: Arc<dyn PreferencesStore>,
    geofence_store: Arc<dyn GeofenceStore>,
    monitor: Arc<LoggingGeofenceMonitor>,
}

impl Agent {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let context = config.device.to_context()?;

        let (preferences, geofence_store): (Arc<dyn PreferencesStore>, Arc<dyn GeofenceStore>) =
            if config.storage.persist {
                info!(
                    preferences = ?config.storage.preferences_path,
                    geofences = ?config.storage.geofences_path,
                    "Using file-backed storage"
                );
                (
                    Arc::new(FilePreferencesStore::new(&config.storage.preferences_path)),
                    Arc::new(FileGeofenceStore::new(&config.storage.geofences_path)),
                )
            } else {
                warn!("Persistence disabled, using in-memory storage (state is lost on exit)");
                (
                    Arc::new(MemoryPreferencesStore::new()),
                    Arc::new(MemoryGeofenceStore::new()),
                )
            };

        let api = Arc::new(
            PushApiClient::with_timeout(config.http.timeout)
                .context("Failed to create push API client")?,
        );
        let provider = Arc::new(StaticPushProvider::new(config.device.platform_token.clone()));
        let monitor = Arc::new(LoggingGeofenceMonitor::new(config.device.location_permission));

        let geofence_engine = Arc::new(GeofenceEngine::new(monitor.clone(), geofence_store.clone()));
        let updater = Arc::new(GeofenceUpdater::new(
            api.clone(),
            geofence_engine,
            preferences.clone(),
        ));

        Ok(Self {
            registration: Arc::new(RegistrationEngine::new(
                context,
                provider.clone(),
                api.clone(),
                preferences.clone(),
                updater.clone(),
            )),
            unregistration: Arc::new(UnregistrationEngine::new(
                provider,
                api,
                preferences.clone(),
                updater.clone(),
            )),
            updater,
            preferences,
            geofence_store,
            monitor,
        })
    }

    pub fn registration(&self) -> &Arc<RegistrationEngine> {
        &self.registration
    }

    pub fn unregistration(&self) -> &Arc<UnregistrationEngine> {
        &self.unregistration
    }

    pub fn monitor(&self) -> &Arc<LoggingGeofenceMonitor> {
        &self.monitor
    }

    /// Re-arm the monitor from the stored geofences, as after a restart.
    pub async fn restore_geofences(&self) -> AppResult<()> {
        let record = self.preferences.load().await?;
        if !record.geofences_enabled || !self.updater.engine().is_permission_granted() {
            return Ok(());
        }
        self.updater
            .engine()
            .reregister_current_locations(&record.tags)
            .await?;
        Ok(())
    }

    pub async fn register(&self, params: &RegistrationParameters) -> AppResult<()> {
        self.registration.register_device(params).await?;
        Ok(())
    }

    pub async fn unregister(&self, params: &RegistrationParameters) -> AppResult<()> {
        self.unregistration.unregister_device(params).await?;
        Ok(())
    }

    /// Fetch geofence changes since the last sync, as triggered by a silent
    /// push. Returns false when geofencing is off or not permitted.
    pub async fn refresh_geofences(&self, params: &RegistrationParameters) -> AppResult<bool> {
        let record = self.preferences.load().await?;
        if !record.geofences_enabled {
            info!("Geofencing is not enabled for this device, nothing to refresh");
            return Ok(false);
        }
        if !self.updater.engine().is_permission_granted() {
            warn!("Location permission not granted, skipping geofence refresh");
            return Ok(false);
        }
        self.updater.refresh(&params.credentials()).await?;
        Ok(true)
    }

    /// Stop monitoring individual locations, e.g. ones the platform reported
    /// as triggered. Unknown request ids are ignored. Returns how many
    /// locations were removed.
    pub async fn clear_locations(&self, request_ids: &[String]) -> AppResult<usize> {
        let stored = self.geofence_store.currently_registered_geofences().await?;
        let locations =
            GeofenceLocationMap::from_request_ids(request_ids.iter().map(String::as_str), &stored);
        if locations.is_empty() {
            info!(requested = request_ids.len(), "No stored locations match the request ids");
            return Ok(0);
        }

        let record = self.preferences.load().await?;
        self.updater
            .engine()
            .clear_locations(&locations, &record.tags)
            .await?;
        Ok(locations.len())
    }

    /// The persisted record with secrets redacted.
    pub async fn status(&self) -> AppResult<Value> {
        let record = self.preferences.load().await?;
        Ok(redacted_status(&record)?)
    }
}

fn redacted_status(record: &RegistrationRecord) -> Result<Value, serde_json::Error> {
    let mut status = serde_json::to_value(record)?;
    if let Some(fields) = status.as_object_mut() {
        for key in ["platform_secret", "platform_token", "backend_token"] {
            if fields.get(key).is_some_and(|v| !v.is_null()) {
                fields.insert(key.to_string(), json!(REDACTED));
            }
        }
        fields.insert(
            "registered".to_string(),
            json!(record.is_registered_with_backend()),
        );
    }
    Ok(status)
}
