//! The persisted record of the last known-good registration state.

use crate::params::TagSet;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Milliseconds since the epoch of the last successful geofence sync.
///
/// Zero is reserved for "never updated".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncTimestamp(i64);

impl SyncTimestamp {
    pub const NEVER: SyncTimestamp = SyncTimestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn is_never(&self) -> bool {
        self.0 == Self::NEVER.0
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last known-good registration state.
///
/// `backend_id` is only trusted for the token recorded in `backend_token`.
/// Secrets are persisted in clear so the next process can authenticate, but
/// never show up in `Debug` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationRecord {
    #[serde(serialize_with = "expose_optional_secret")]
    pub platform_token: Option<SecretString>,
    /// Sender identity the platform token was issued for.
    pub platform_sender_identity: Option<String>,
    pub backend_id: Option<String>,
    /// Platform token the backend registration was made with.
    #[serde(serialize_with = "expose_optional_secret")]
    pub backend_token: Option<SecretString>,
    pub platform_uuid: Option<String>,
    #[serde(serialize_with = "expose_optional_secret")]
    pub platform_secret: Option<SecretString>,
    pub device_alias: Option<String>,
    pub custom_user_id: Option<String>,
    pub tags: TagSet,
    pub service_url: Option<String>,
    pub package_name: Option<String>,
    pub app_version: Option<String>,
    pub geofences_enabled: bool,
    pub last_geofence_update: SyncTimestamp,
}

impl RegistrationRecord {
    /// Apply every field of a patch, in order.
    pub fn apply(&mut self, patch: &RecordPatch) {
        for field in &patch.fields {
            match field.clone() {
                RecordField::PlatformToken(v) => self.platform_token = v,
                RecordField::PlatformSenderIdentity(v) => self.platform_sender_identity = v,
                RecordField::BackendId(v) => self.backend_id = v,
                RecordField::BackendToken(v) => self.backend_token = v,
                RecordField::PlatformUuid(v) => self.platform_uuid = v,
                RecordField::PlatformSecret(v) => self.platform_secret = v,
                RecordField::DeviceAlias(v) => self.device_alias = v,
                RecordField::CustomUserId(v) => self.custom_user_id = v,
                RecordField::Tags(v) => self.tags = v,
                RecordField::ServiceUrl(v) => self.service_url = v,
                RecordField::PackageName(v) => self.package_name = v,
                RecordField::AppVersion(v) => self.app_version = v,
                RecordField::GeofencesEnabled(v) => self.geofences_enabled = v,
                RecordField::LastGeofenceUpdate(v) => self.last_geofence_update = v,
            }
        }
    }

    pub fn is_registered_with_backend(&self) -> bool {
        self.backend_id.is_some()
    }

    pub fn platform_token(&self) -> Option<&str> {
        expose(&self.platform_token)
    }

    pub fn backend_token(&self) -> Option<&str> {
        expose(&self.backend_token)
    }

    pub fn platform_secret(&self) -> Option<&str> {
        expose(&self.platform_secret)
    }
}

impl PartialEq for RegistrationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.platform_token() == other.platform_token()
            && self.platform_sender_identity == other.platform_sender_identity
            && self.backend_id == other.backend_id
            && self.backend_token() == other.backend_token()
            && self.platform_uuid == other.platform_uuid
            && self.platform_secret() == other.platform_secret()
            && self.device_alias == other.device_alias
            && self.custom_user_id == other.custom_user_id
            && self.tags == other.tags
            && self.service_url == other.service_url
            && self.package_name == other.package_name
            && self.app_version == other.app_version
            && self.geofences_enabled == other.geofences_enabled
            && self.last_geofence_update == other.last_geofence_update
    }
}

impl Eq for RegistrationRecord {}

fn expose(secret: &Option<SecretString>) -> Option<&str> {
    secret.as_ref().map(|s| s.expose_secret().as_str())
}

fn expose_optional_secret<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    expose(secret).serialize(serializer)
}

/// A single field assignment on the record.
#[derive(Debug, Clone)]
pub enum RecordField {
    PlatformToken(Option<SecretString>),
    PlatformSenderIdentity(Option<String>),
    BackendId(Option<String>),
    BackendToken(Option<SecretString>),
    PlatformUuid(Option<String>),
    PlatformSecret(Option<SecretString>),
    DeviceAlias(Option<String>),
    CustomUserId(Option<String>),
    Tags(TagSet),
    ServiceUrl(Option<String>),
    PackageName(Option<String>),
    AppVersion(Option<String>),
    GeofencesEnabled(bool),
    LastGeofenceUpdate(SyncTimestamp),
}

/// A batch of field assignments applied atomically by a preferences store.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    fields: Vec<RecordField>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: RecordField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push(&mut self, field: RecordField) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields owned by the platform push provider registration.
    pub fn clear_platform() -> Self {
        Self::new()
            .set(RecordField::PlatformToken(None))
            .set(RecordField::PlatformSenderIdentity(None))
            .set(RecordField::AppVersion(None))
    }

    /// Fields owned by the backend registration.
    pub fn clear_backend() -> Self {
        Self::new()
            .set(RecordField::BackendId(None))
            .set(RecordField::BackendToken(None))
            .set(RecordField::PlatformUuid(None))
            .set(RecordField::PlatformSecret(None))
            .set(RecordField::DeviceAlias(None))
            .set(RecordField::CustomUserId(None))
            .set(RecordField::Tags(TagSet::new()))
            .set(RecordField::ServiceUrl(None))
            .set(RecordField::PackageName(None))
    }

    /// Geofence bookkeeping fields.
    pub fn clear_geofences() -> Self {
        Self::new()
            .set(RecordField::GeofencesEnabled(false))
            .set(RecordField::LastGeofenceUpdate(SyncTimestamp::NEVER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> Option<SecretString> {
        Some(SecretString::new(value.to_string()))
    }

    #[test]
    fn test_default_record_is_unregistered() {
        let record = RegistrationRecord::default();
        assert!(!record.is_registered_with_backend());
        assert!(record.last_geofence_update.is_never());
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_apply_patch() {
        let mut record = RegistrationRecord::default();
        let patch = RecordPatch::new()
            .set(RecordField::PlatformToken(secret("token")))
            .set(RecordField::BackendId(Some("device-1".into())))
            .set(RecordField::BackendToken(secret("token")))
            .set(RecordField::Tags(["A", "b"].into_iter().collect()));

        record.apply(&patch);

        assert_eq!(record.platform_token(), Some("token"));
        assert_eq!(record.backend_token(), Some("token"));
        assert_eq!(record.backend_id.as_deref(), Some("device-1"));
        assert!(record.tags.contains("a"));
    }

    #[test]
    fn test_clear_backend_leaves_platform_fields() {
        let mut record = RegistrationRecord {
            platform_token: secret("token"),
            platform_sender_identity: Some("uuid".into()),
            app_version: Some("3".into()),
            backend_id: Some("device-1".into()),
            backend_token: secret("token"),
            platform_uuid: Some("uuid".into()),
            service_url: Some("https://push.example.com".into()),
            ..Default::default()
        };

        record.apply(&RecordPatch::clear_backend());

        assert_eq!(record.platform_token(), Some("token"));
        assert_eq!(record.platform_sender_identity.as_deref(), Some("uuid"));
        assert_eq!(record.app_version.as_deref(), Some("3"));
        assert!(record.backend_id.is_none());
        assert!(record.backend_token.is_none());
        assert!(record.platform_uuid.is_none());
        assert!(record.service_url.is_none());
    }

    #[test]
    fn test_clear_platform_forgets_sender_identity() {
        let mut record = RegistrationRecord {
            platform_token: secret("token"),
            platform_sender_identity: Some("uuid".into()),
            backend_id: Some("device-1".into()),
            ..Default::default()
        };

        record.apply(&RecordPatch::clear_platform());

        assert!(record.platform_token.is_none());
        assert!(record.platform_sender_identity.is_none());
        assert_eq!(record.backend_id.as_deref(), Some("device-1"));
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let record: RegistrationRecord =
            serde_json::from_str(r#"{"backend_id":"device-1","last_geofence_update":1500}"#)
                .unwrap();
        assert_eq!(record.backend_id.as_deref(), Some("device-1"));
        assert_eq!(record.last_geofence_update, SyncTimestamp::from_millis(1500));
        assert!(record.platform_token.is_none());
        assert!(record.backend_token.is_none());
    }

    #[test]
    fn test_secrets_persist_but_stay_out_of_debug() {
        let record = RegistrationRecord {
            platform_token: secret("tok-123"),
            backend_token: secret("tok-123"),
            platform_secret: secret("s3cret"),
            ..Default::default()
        };

        let debug = format!("{:?}", record);
        assert!(!debug.contains("tok-123"));
        assert!(!debug.contains("s3cret"));

        let json = serde_json::to_string(&record).unwrap();
        let restored: RegistrationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.platform_secret(), Some("s3cret"));
    }

    #[test]
    fn test_records_with_different_tokens_differ() {
        let a = RegistrationRecord {
            platform_token: secret("token-1"),
            ..Default::default()
        };
        let b = RegistrationRecord {
            platform_token: secret("token-2"),
            ..Default::default()
        };
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
