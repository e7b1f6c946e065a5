//! Registration engine: brings the platform token, the backend registration
//! and the local record into agreement with the fewest possible calls.

use crate::error::{BackendError, PushError, PushResult, ValidationError};
use crate::geofence::GeofenceUpdater;
use crate::listener::{notify_registration, RegistrationListener};
use crate::params::{DeviceContext, RegistrationParameters, TagSet};
use crate::ports::{BackendRegistrationApi, PreferencesStore, PushProvider, RegistrationPayload};
use crate::record::{RecordField, RecordPatch, RegistrationRecord, SyncTimestamp};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What the backend step has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendAction {
    /// Stored record already matches; no backend call.
    NoOp,
    /// No usable backend registration exists for this token and endpoint.
    Create,
    /// Only mutable identity fields changed.
    Update,
}

/// Whether a fresh platform token must be requested.
pub fn platform_registration_required(
    record: &RegistrationRecord,
    params: &RegistrationParameters,
    context: &DeviceContext,
) -> bool {
    record.platform_token.is_none()
        || record.app_version.as_deref() != Some(context.app_version.as_str())
        || record.platform_sender_identity.as_deref() != Some(params.platform_uuid.as_str())
}

/// Decide the backend step from the record as it was before this call.
///
/// A backend registration made with a different token than `token` is
/// never updated in place.
pub fn decide_backend_action(
    record: &RegistrationRecord,
    params: &RegistrationParameters,
    token: &str,
) -> BackendAction {
    let needs_create = record.backend_id.is_none()
        || record.backend_token() != Some(token)
        || record.service_url.as_deref() != Some(params.service_url.as_str());
    if needs_create {
        return BackendAction::Create;
    }

    let needs_update = record.platform_uuid.as_deref() != Some(params.platform_uuid.as_str())
        || record.platform_secret() != Some(params.platform_secret.expose_secret().as_str())
        || record.device_alias != params.device_alias
        || record.custom_user_id != params.custom_user_id
        || record.tags != params.tags;
    if needs_update {
        BackendAction::Update
    } else {
        BackendAction::NoOp
    }
}

/// Registration engine.
pub struct RegistrationEngine {
    context: DeviceContext,
    provider: Arc<dyn PushProvider>,
    backend: Arc<dyn BackendRegistrationApi>,
    preferences: Arc<dyn PreferencesStore>,
    geofences: Arc<GeofenceUpdater>,
}

impl RegistrationEngine {
    pub fn new(
        context: DeviceContext,
        provider: Arc<dyn PushProvider>,
        backend: Arc<dyn BackendRegistrationApi>,
        preferences: Arc<dyn PreferencesStore>,
        geofences: Arc<GeofenceUpdater>,
    ) -> Self {
        Self {
            context,
            provider,
            backend,
            preferences,
            geofences,
        }
    }

    /// Register the device.
    ///
    /// Validation happens before anything else and is reported as
    /// [`PushError::Validation`]. Every later failure aborts the remaining
    /// steps but keeps what earlier steps persisted.
    #[instrument(skip_all, fields(platform_uuid = %params.platform_uuid))]
    pub async fn register_device(&self, params: &RegistrationParameters) -> PushResult<()> {
        params.validate()?;

        if !self.provider.is_available() {
            warn!("Push platform unavailable, registration aborted");
            return Err(PushError::PlatformUnavailable);
        }

        let record = self.preferences.load().await?;

        let token = self.ensure_platform_token(&record, params).await?;
        self.persist_platform_fields(&record, params, &token).await?;

        let action = decide_backend_action(&record, params, token.expose_secret());
        self.run_backend_action(action, &record, params, &token).await?;

        self.sync_geofences(&record, params).await?;

        info!(?action, "Device registration complete");
        Ok(())
    }

    /// Validate now, then run the registration in the background and report
    /// the outcome to `listener` exactly once.
    pub fn register_device_with_listener(
        self: &Arc<Self>,
        params: RegistrationParameters,
        listener: Arc<dyn RegistrationListener>,
    ) -> Result<JoinHandle<()>, ValidationError> {
        params.validate()?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let result = engine.register_device(&params).await;
            notify_registration(listener.as_ref(), result);
        }))
    }

    async fn ensure_platform_token(
        &self,
        record: &RegistrationRecord,
        params: &RegistrationParameters,
    ) -> PushResult<SecretString> {
        if !platform_registration_required(record, params, &self.context) {
            if let Some(token) = &record.platform_token {
                debug!("Reusing stored platform token");
                return Ok(token.clone());
            }
        }

        let identity_changed = record
            .platform_sender_identity
            .as_deref()
            .is_some_and(|stored| stored != params.platform_uuid);
        if record.platform_token.is_some() && identity_changed {
            info!("Platform identity changed, discarding previous token");
            if let Err(e) = self.provider.unregister().await {
                warn!(error = %e, "Failed to discard previous platform token, continuing");
            }
        }

        let token = self
            .provider
            .register(&params.platform_uuid)
            .await
            .map_err(|e| {
                warn!(error = %e, "Platform token registration failed");
                PushError::PlatformRegistration(e)
            })?;
        info!("Obtained platform token");
        Ok(SecretString::new(token))
    }

    async fn persist_platform_fields(
        &self,
        record: &RegistrationRecord,
        params: &RegistrationParameters,
        token: &SecretString,
    ) -> PushResult<()> {
        let mut patch = RecordPatch::new();
        if record.platform_token() != Some(token.expose_secret().as_str()) {
            patch.push(RecordField::PlatformToken(Some(token.clone())));
        }
        if record.platform_sender_identity.as_deref() != Some(params.platform_uuid.as_str()) {
            patch.push(RecordField::PlatformSenderIdentity(Some(params.platform_uuid.clone())));
        }
        if record.package_name.as_deref() != Some(self.context.package_name.as_str()) {
            patch.push(RecordField::PackageName(Some(self.context.package_name.clone())));
        }
        if record.app_version.as_deref() != Some(self.context.app_version.as_str()) {
            patch.push(RecordField::AppVersion(Some(self.context.app_version.clone())));
        }
        if !patch.is_empty() {
            self.preferences.apply(patch).await?;
        }
        Ok(())
    }

    async fn run_backend_action(
        &self,
        action: BackendAction,
        record: &RegistrationRecord,
        params: &RegistrationParameters,
        token: &SecretString,
    ) -> PushResult<()> {
        let registration = match (action, record.backend_id.as_deref()) {
            (BackendAction::NoOp, _) => {
                debug!("Backend registration already up to date");
                return Ok(());
            }
            (BackendAction::Update, Some(backend_id)) => {
                let payload = self.payload(params, token, &record.tags);
                info!(backend_id = %backend_id, "Updating backend registration");
                self.backend.update(backend_id, &payload).await
            }
            _ => {
                let payload = self.payload(params, token, &TagSet::new());
                info!("Creating backend registration");
                self.backend.create(&payload).await
            }
        };

        let backend_id = registration
            .and_then(|r| r.device_uuid.ok_or(BackendError::MissingRegistrationId))
            .map_err(|e| {
                warn!(error = %e, "Backend registration failed");
                PushError::Backend(e)
            })?;

        let patch = RecordPatch::new()
            .set(RecordField::BackendId(Some(backend_id.clone())))
            .set(RecordField::BackendToken(Some(token.clone())))
            .set(RecordField::PlatformUuid(Some(params.platform_uuid.clone())))
            .set(RecordField::PlatformSecret(Some(params.platform_secret.clone())))
            .set(RecordField::DeviceAlias(params.device_alias.clone()))
            .set(RecordField::CustomUserId(params.custom_user_id.clone()))
            .set(RecordField::Tags(params.tags.clone()))
            .set(RecordField::ServiceUrl(Some(params.service_url.clone())));
        self.preferences.apply(patch).await?;

        info!(backend_id = %backend_id, "Backend registration stored");
        Ok(())
    }

    fn payload(
        &self,
        params: &RegistrationParameters,
        token: &SecretString,
        previous_tags: &TagSet,
    ) -> RegistrationPayload {
        RegistrationPayload {
            credentials: params.credentials(),
            platform_token: token.clone(),
            device_alias: params.device_alias.clone(),
            custom_user_id: params.custom_user_id.clone(),
            subscribe_tags: params.tags.difference(previous_tags),
            unsubscribe_tags: previous_tags.difference(&params.tags),
            package_name: self.context.package_name.clone(),
            os: self.context.os.clone(),
            os_version: self.context.os_version.clone(),
            device_manufacturer: self.context.manufacturer.clone(),
            device_model: self.context.model.clone(),
        }
    }

    async fn sync_geofences(
        &self,
        record: &RegistrationRecord,
        params: &RegistrationParameters,
    ) -> PushResult<()> {
        if params.geofences_enabled {
            if !self.geofences.engine().is_permission_granted() {
                warn!("Location permission not granted, skipping geofence update");
            } else if record.last_geofence_update.is_never() || !record.geofences_enabled {
                info!("Fetching initial geofence set");
                self.geofences
                    .start_update(&params.credentials(), SyncTimestamp::NEVER)
                    .await?;
            } else if record.tags != params.tags {
                info!("Subscribed tags changed, re-arming stored geofences");
                self.geofences
                    .engine()
                    .reregister_current_locations(&params.tags)
                    .await?;
            }
        } else if record.geofences_enabled {
            info!("Geofences disabled, clearing monitor and store");
            self.geofences.clear_from_monitor_and_store().await?;
        }

        if record.geofences_enabled != params.geofences_enabled {
            self.preferences
                .apply(RecordPatch::new().set(RecordField::GeofencesEnabled(params.geofences_enabled)))
                .await?;
        }
        Ok(())
    }
}
