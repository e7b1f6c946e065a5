//! Unregistration engine: discards the platform token, deletes the backend
//! registration and clears geofences.

use crate::error::{PushError, PushResult, ValidationError};
use crate::geofence::GeofenceUpdater;
use crate::listener::{notify_unregistration, UnregistrationListener};
use crate::params::RegistrationParameters;
use crate::ports::{BackendRegistrationApi, PreferencesStore, PushProvider};
use crate::record::RecordPatch;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

pub struct UnregistrationEngine {
    provider: Arc<dyn PushProvider>,
    backend: Arc<dyn BackendRegistrationApi>,
    preferences: Arc<dyn PreferencesStore>,
    geofences: Arc<GeofenceUpdater>,
}

impl UnregistrationEngine {
    pub fn new(
        provider: Arc<dyn PushProvider>,
        backend: Arc<dyn BackendRegistrationApi>,
        preferences: Arc<dyn PreferencesStore>,
        geofences: Arc<GeofenceUpdater>,
    ) -> Self {
        Self {
            provider,
            backend,
            preferences,
            geofences,
        }
    }

    /// Unregister the device.
    ///
    /// A platform failure is logged and ignored. A backend delete failure
    /// fails the call and keeps every backend field so it can be retried.
    #[instrument(skip_all, fields(platform_uuid = %params.platform_uuid))]
    pub async fn unregister_device(&self, params: &RegistrationParameters) -> PushResult<()> {
        params.validate()?;

        let record = self.preferences.load().await?;

        match self.provider.unregister().await {
            Ok(()) => {
                self.preferences.apply(RecordPatch::clear_platform()).await?;
                info!("Platform token discarded");
            }
            Err(e) => warn!(error = %e, "Failed to discard platform token, continuing"),
        }

        if let Some(backend_id) = record.backend_id.as_deref() {
            if let Err(e) = self.backend.delete(backend_id, &params.credentials()).await {
                warn!(backend_id = %backend_id, error = %e, "Backend unregistration failed");
                return Err(PushError::Backend(e));
            }
            self.preferences.apply(RecordPatch::clear_backend()).await?;
            info!(backend_id = %backend_id, "Backend registration deleted");
        }

        if record.geofences_enabled {
            self.geofences.clear_from_monitor_and_store().await?;
            self.preferences.apply(RecordPatch::clear_geofences()).await?;
            info!("Geofences cleared");
        } else if let Err(e) = self.geofences.clear_from_store_only().await {
            warn!(error = %e, "Failed to clear geofence store");
        }

        Ok(())
    }

    /// Validate now, then unregister in the background and report the
    /// outcome to `listener` exactly once.
    pub fn unregister_device_with_listener(
        self: &Arc<Self>,
        params: RegistrationParameters,
        listener: Arc<dyn UnregistrationListener>,
    ) -> Result<JoinHandle<()>, ValidationError> {
        params.validate()?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let result = engine.unregister_device(&params).await;
            notify_unregistration(listener.as_ref(), result);
        }))
    }
}
