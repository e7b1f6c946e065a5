//! Caller-supplied registration parameters and device context.

use crate::error::{ValidationError, MAX_CUSTOM_USER_ID_LENGTH};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of subscription tags, normalized to lower case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a tag. Blank tags are ignored.
    pub fn insert(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() {
            self.0.insert(tag);
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(&tag.trim().to_lowercase())
    }

    /// Tags in `self` that are not in `other`.
    pub fn difference(&self, other: &TagSet) -> TagSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = TagSet::new();
        for tag in iter {
            tags.insert(tag.as_ref());
        }
        tags
    }
}

impl From<BTreeSet<String>> for TagSet {
    fn from(tags: BTreeSet<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for BTreeSet<String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

/// How the backend client validates the server's TLS certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CertificateValidation {
    /// Platform trust store.
    #[default]
    Default,
    /// Accept any certificate. Development only.
    TrustAll,
    /// Trust only the given PEM or DER encoded certificates.
    Pinned(Vec<Vec<u8>>),
}

/// Parameters for a single registration or unregistration call.
#[derive(Debug, Clone)]
pub struct RegistrationParameters {
    pub platform_uuid: String,
    pub platform_secret: SecretString,
    pub service_url: String,
    pub device_alias: Option<String>,
    pub custom_user_id: Option<String>,
    pub tags: TagSet,
    pub geofences_enabled: bool,
    pub certificate_validation: CertificateValidation,
}

impl RegistrationParameters {
    pub fn new(
        platform_uuid: impl Into<String>,
        platform_secret: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            platform_uuid: platform_uuid.into(),
            platform_secret: SecretString::new(platform_secret.into()),
            service_url: service_url.into(),
            device_alias: None,
            custom_user_id: None,
            tags: TagSet::new(),
            geofences_enabled: false,
            certificate_validation: CertificateValidation::Default,
        }
    }

    pub fn with_device_alias(mut self, alias: impl Into<String>) -> Self {
        self.device_alias = Some(alias.into());
        self
    }

    pub fn with_custom_user_id(mut self, custom_user_id: impl Into<String>) -> Self {
        self.custom_user_id = Some(custom_user_id.into());
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_geofences_enabled(mut self, enabled: bool) -> Self {
        self.geofences_enabled = enabled;
        self
    }

    pub fn with_certificate_validation(mut self, mode: CertificateValidation) -> Self {
        self.certificate_validation = mode;
        self
    }

    /// Check the mandatory fields. Performs no I/O.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.platform_uuid.trim().is_empty() {
            return Err(ValidationError::MissingPlatformUuid);
        }
        if self.platform_secret.expose_secret().trim().is_empty() {
            return Err(ValidationError::MissingPlatformSecret);
        }
        if self.service_url.trim().is_empty() {
            return Err(ValidationError::MissingServiceUrl);
        }
        url::Url::parse(&self.service_url)
            .map_err(|e| ValidationError::InvalidServiceUrl(format!("{}: {}", self.service_url, e)))?;
        if let Some(custom_user_id) = &self.custom_user_id {
            let length = custom_user_id.chars().count();
            if length > MAX_CUSTOM_USER_ID_LENGTH {
                return Err(ValidationError::CustomUserIdTooLong { length });
            }
        }
        Ok(())
    }

    /// The subset needed to authenticate against the backend.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            platform_uuid: self.platform_uuid.clone(),
            platform_secret: self.platform_secret.clone(),
            service_url: self.service_url.clone(),
            certificate_validation: self.certificate_validation.clone(),
        }
    }
}

/// Backend endpoint and basic-auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub platform_uuid: String,
    pub platform_secret: SecretString,
    pub service_url: String,
    pub certificate_validation: CertificateValidation,
}

/// Static facts about the running application and device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    pub package_name: String,
    pub app_version: String,
    pub os: String,
    pub os_version: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceContext {
    /// Create a context for the current host. Fails on an empty package name.
    pub fn new(
        package_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let package_name = package_name.into();
        if package_name.trim().is_empty() {
            return Err(ValidationError::MissingPackageName);
        }
        Ok(Self {
            package_name,
            app_version: app_version.into(),
            os: std::env::consts::OS.to_string(),
            os_version: String::new(),
            manufacturer: String::new(),
            model: std::env::consts::ARCH.to_string(),
        })
    }

    pub fn with_device(
        mut self,
        os_version: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.os_version = os_version.into();
        self.manufacturer = manufacturer.into();
        self.model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RegistrationParameters {
        RegistrationParameters::new("variant-uuid", "variant-secret", "https://push.example.com")
    }

    #[test]
    fn test_tags_are_lowercased() {
        let tags: TagSet = ["Sports", "NEWS", " weather ", ""].into_iter().collect();
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("sports"));
        assert!(tags.contains("News"));
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["news", "sports", "weather"]);
    }

    #[test]
    fn test_tag_difference() {
        let old: TagSet = ["a", "b"].into_iter().collect();
        let new: TagSet = ["b", "c"].into_iter().collect();
        assert_eq!(new.difference(&old).iter().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(old.difference(&new).iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_tagset_serde_normalizes() {
        let tags: TagSet = serde_json::from_str(r#"["Alpha","beta"]"#).unwrap();
        assert!(tags.contains("alpha"));
        assert_eq!(serde_json::to_string(&tags).unwrap(), r#"["alpha","beta"]"#);
    }

    #[test]
    fn test_validate_mandatory_fields() {
        assert!(params().validate().is_ok());

        let mut p = params();
        p.platform_uuid = String::new();
        assert_eq!(p.validate(), Err(ValidationError::MissingPlatformUuid));

        let mut p = params();
        p.platform_secret = SecretString::new("  ".into());
        assert_eq!(p.validate(), Err(ValidationError::MissingPlatformSecret));

        let mut p = params();
        p.service_url = String::new();
        assert_eq!(p.validate(), Err(ValidationError::MissingServiceUrl));

        let mut p = params();
        p.service_url = "not a url".into();
        assert!(matches!(p.validate(), Err(ValidationError::InvalidServiceUrl(_))));
    }

    #[test]
    fn test_custom_user_id_length_boundary() {
        let ok = params().with_custom_user_id("u".repeat(255));
        assert!(ok.validate().is_ok());

        let too_long = params().with_custom_user_id("u".repeat(256));
        assert_eq!(
            too_long.validate(),
            Err(ValidationError::CustomUserIdTooLong { length: 256 })
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", params());
        assert!(!debug.contains("variant-secret"));
        assert!(debug.contains("REDACTED"));

        let debug = format!("{:?}", params().credentials());
        assert!(!debug.contains("variant-secret"));
    }

    #[test]
    fn test_device_context_requires_package_name() {
        assert_eq!(
            DeviceContext::new("", "1.0"),
            Err(ValidationError::MissingPackageName)
        );
        let ctx = DeviceContext::new("com.example.app", "7").unwrap();
        assert_eq!(ctx.package_name, "com.example.app");
        assert_eq!(ctx.os, std::env::consts::OS);
    }
}
