//! Common test utilities for integration tests.

use push_agent::Config;
use secrecy::SecretString;
use std::path::Path;
use std::time::Duration;
use wiremock::MockServer;

/// Agent configuration pointing at a mock backend and a temp directory.
pub fn test_config(mock_server: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();

    config.registration.platform_uuid = "variant-uuid".into();
    config.registration.platform_secret = Some(SecretString::new("variant-secret".into()));
    config.registration.service_url = mock_server.uri();
    config.registration.device_alias = Some("lab-box".into());
    config.registration.tags = "promo".into();
    config.registration.geofences_enabled = true;

    config.device.package_name = "org.example.agent-test".into();
    config.device.app_version = "1.0.0".into();
    config.device.platform_token = Some(SecretString::new("token-1".into()));

    config.storage.preferences_path = data_dir.join("preferences.json");
    config.storage.geofences_path = data_dir.join("geofences.json");

    config.http.timeout = Duration::from_secs(5);
    config
}

/// A geofence delta with one tagged and one untagged geofence.
pub fn geofence_delta(last_modified: i64) -> serde_json::Value {
    serde_json::json!({
        "last_modified": last_modified,
        "geofences": [
            {
                "id": 1,
                "expiry_time": 4102444800000i64,
                "trigger_type": "enter",
                "locations": [
                    { "lat": 43.65, "long": -79.38, "rad": 150.0 },
                    { "lat": 43.70, "long": -79.40, "rad": 90.0 }
                ]
            },
            {
                "id": 2,
                "expiry_time": 4102444800000i64,
                "trigger_type": "exit",
                "tag": "other",
                "locations": [{ "lat": 40.0, "long": -74.0, "rad": 50.0 }]
            }
        ],
        "deleted_geofence_ids": []
    })
}
