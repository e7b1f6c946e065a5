//! Error types for the reconciliation engines and their ports.

use thiserror::Error;

/// Maximum length (in characters) of a custom user id.
pub const MAX_CUSTOM_USER_ID_LENGTH: usize = 255;

/// Local validation failures. Raised before any network or storage access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Platform UUID may not be empty")]
    MissingPlatformUuid,

    #[error("Platform secret may not be empty")]
    MissingPlatformSecret,

    #[error("Service URL may not be empty")]
    MissingServiceUrl,

    #[error("Service URL is malformed: {0}")]
    InvalidServiceUrl(String),

    #[error("Package name may not be empty")]
    MissingPackageName,

    #[error("Custom user ID is {length} characters long (maximum {MAX_CUSTOM_USER_ID_LENGTH})")]
    CustomUserIdTooLong { length: usize },
}

/// Failure reported by the platform push provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Failures reported by the backend registration service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend rejected request: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("Backend response did not include a device registration id")]
    MissingRegistrationId,

    #[error("Could not decode backend response: {0}")]
    Decode(String),
}

/// Persistence failures of the preferences or geofence stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Failures while reconciling geofences.
#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("Geofence monitor error: {0}")]
    Monitor(String),

    #[error("Geofence store error: {0}")]
    Store(#[from] StoreError),

    #[error("Geofence update fetch failed: {0}")]
    Fetch(#[from] BackendError),

    #[error("Device is not registered with the backend")]
    NotRegistered,
}

/// Top-level error for registration and unregistration calls.
///
/// `Validation` means the call was never attempted. Every other variant is an
/// operational failure of a step that was attempted; state committed by
/// earlier successful steps is kept.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    #[error("Push platform is not available on this device")]
    PlatformUnavailable,

    #[error("Platform registration failed: {0}")]
    PlatformRegistration(ProviderError),

    #[error("Backend registration failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Geofence update failed: {0}")]
    Geofence(#[from] GeofenceError),

    #[error("Preferences store failed: {0}")]
    Store(#[from] StoreError),
}

impl PushError {
    /// True when the call failed local validation and nothing was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self, PushError::Validation(_))
    }
}

/// Result type alias for engine calls.
pub type PushResult<T> = Result<T, PushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::CustomUserIdTooLong { length: 256 };
        assert_eq!(
            err.to_string(),
            "Custom user ID is 256 characters long (maximum 255)"
        );

        let err = BackendError::Rejected {
            status: 401,
            body: "unauthorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "Backend rejected request: 401 - unauthorized"
        );
    }

    #[test]
    fn test_validation_is_distinct() {
        let err: PushError = ValidationError::MissingPlatformUuid.into();
        assert!(err.is_validation());

        let err: PushError = BackendError::MissingRegistrationId.into();
        assert!(!err.is_validation());
        assert!(!PushError::PlatformUnavailable.is_validation());
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
