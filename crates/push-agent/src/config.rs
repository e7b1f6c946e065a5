//! Agent configuration loaded from environment variables.

use anyhow::{Context, Result};
use push_engine::{CertificateValidation, DeviceContext, RegistrationParameters};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Backend registration settings
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Application and device identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default)]
    pub platform_uuid: String,

    #[serde(default)]
    pub platform_secret: Option<SecretString>,

    /// Backend base URL
    #[serde(default)]
    pub service_url: String,

    #[serde(default)]
    pub device_alias: Option<String>,

    #[serde(default)]
    pub custom_user_id: Option<String>,

    /// Comma-separated subscription tags
    #[serde(default)]
    pub tags: String,

    #[serde(default)]
    pub geofences_enabled: bool,

    #[serde(default)]
    pub certificate_mode: CertificateMode,

    /// Comma-separated PEM or DER files, used when `certificate_mode = pinned`
    #[serde(default)]
    pub pinned_certificates: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateMode {
    #[default]
    Default,
    TrustAll,
    Pinned,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Application package identifier
    #[serde(default = "default_package_name")]
    pub package_name: String,

    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Token handed out by the static push provider. None means the
    /// platform is unavailable.
    #[serde(default)]
    pub platform_token: Option<SecretString>,

    #[serde(default)]
    pub os_version: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: Option<String>,

    /// Whether location monitoring is permitted
    #[serde(default = "default_true")]
    pub location_permission: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Persist state to disk (if false, state is in-memory only)
    #[serde(default = "default_true")]
    pub persist: bool,

    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    #[serde(default = "default_geofences_path")]
    pub geofences_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default implementations
impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            package_name: default_package_name(),
            app_version: default_app_version(),
            platform_token: None,
            os_version: String::new(),
            manufacturer: String::new(),
            model: None,
            location_permission: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: true,
            preferences_path: default_preferences_path(),
            geofences_path: default_geofences_path(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_package_name() -> String {
    "org.example.push-agent".into()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("data/push-preferences.json")
}

fn default_geofences_path() -> PathBuf {
    PathBuf::from("data/push-geofences.json")
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl RegistrationConfig {
    /// Build registration parameters, reading pinned certificates from disk.
    pub fn to_parameters(&self) -> Result<RegistrationParameters> {
        let certificate_validation = match self.certificate_mode {
            CertificateMode::Default => CertificateValidation::Default,
            CertificateMode::TrustAll => CertificateValidation::TrustAll,
            CertificateMode::Pinned => {
                let certs = split_list(&self.pinned_certificates)
                    .map(|path| {
                        std::fs::read(path)
                            .with_context(|| format!("Failed to read pinned certificate {}", path))
                    })
                    .collect::<Result<Vec<_>>>()?;
                if certs.is_empty() {
                    anyhow::bail!("certificate_mode is pinned but no pinned_certificates are set");
                }
                CertificateValidation::Pinned(certs)
            }
        };

        let mut params = RegistrationParameters::new(&self.platform_uuid, "", &self.service_url)
            .with_tags(split_list(&self.tags))
            .with_geofences_enabled(self.geofences_enabled)
            .with_certificate_validation(certificate_validation);
        if let Some(secret) = &self.platform_secret {
            params.platform_secret = secret.clone();
        }
        params.device_alias = self.device_alias.clone();
        params.custom_user_id = self.custom_user_id.clone();
        Ok(params)
    }
}

impl DeviceConfig {
    pub fn to_context(&self) -> Result<DeviceContext> {
        let context = DeviceContext::new(&self.package_name, &self.app_version)
            .context("Invalid device configuration")?;
        let model = self.model.clone().unwrap_or_else(|| context.model.clone());
        Ok(context.with_device(&self.os_version, &self.manufacturer, model))
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::from_source(config)
    }

    /// Deserialize from an already assembled configuration source.
    pub fn from_source(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
