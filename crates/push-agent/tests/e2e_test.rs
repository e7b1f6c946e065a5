//! End-to-end tests: agent wiring, file stores and HTTP client against a
//! mock backend.

mod common;

use common::{geofence_delta, test_config};
use push_agent::{Agent, AppError};
use push_engine::PushError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_register_refresh_unregister_e2e() {
    // 1. Setup mock backend and storage
    let backend = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let config = test_config(&backend, data_dir.path());

    // 2. Mock backend responses
    Mock::given(method("POST"))
        .and(path("/v1/registration"))
        .and(body_partial_json(json!({
            "registration_token": "token-1",
            "device_alias": "lab-box",
            "package_name": "org.example.agent-test",
            "tags": { "subscribe": ["promo"] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "device_uuid": "device-1" })))
        .expect(1)
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/geofences"))
        .and(query_param("timestamp", "0"))
        .and(query_param("device_uuid", "device-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geofence_delta(5_000)))
        .expect(1)
        .mount(&backend)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/geofences"))
        .and(query_param("timestamp", "5000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v1/registration/device-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend)
        .await;

    // 3. Register: creates the backend registration and arms untagged geofences only
    let agent = Agent::from_config(&config).unwrap();
    let params = config.registration.to_parameters().unwrap();
    agent.register(&params).await.unwrap();

    let armed = agent.monitor().armed();
    assert_eq!(armed.len(), 2);
    assert!(armed.iter().all(|r| r.request_id.starts_with("geofence_1_")));

    let status = agent.status().await.unwrap();
    assert_eq!(status["backend_id"], "device-1");
    assert_eq!(status["backend_token"], "[REDACTED]");
    assert_eq!(status["geofences_enabled"], true);
    assert_eq!(status["last_geofence_update"], 5_000);

    // 4. A fresh agent over the same files sees nothing to do
    let restarted = Agent::from_config(&config).unwrap();
    restarted.restore_geofences().await.unwrap();
    assert_eq!(restarted.monitor().armed().len(), 2);
    restarted.register(&params).await.unwrap();

    // 5. Silent-push refresh with no changes keeps the baseline
    assert!(restarted.refresh_geofences(&params).await.unwrap());
    assert_eq!(restarted.status().await.unwrap()["last_geofence_update"], 5_000);

    // 6. Unregister clears the record and the geofence store
    restarted.unregister(&params).await.unwrap();

    let status = restarted.status().await.unwrap();
    assert_eq!(status["registered"], false);
    assert!(status["backend_id"].is_null());
    assert_eq!(status["geofences_enabled"], false);
    assert!(restarted.monitor().armed().is_empty());
    assert!(!data_dir.path().join("geofences.json").exists());
}

#[tokio::test]
async fn test_backend_rejection_keeps_token_for_retry() {
    let backend = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let mut config = test_config(&backend, data_dir.path());
    config.registration.geofences_enabled = false;

    Mock::given(method("POST"))
        .and(path("/v1/registration"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&backend)
        .await;

    let agent = Agent::from_config(&config).unwrap();
    let params = config.registration.to_parameters().unwrap();
    let err = agent.register(&params).await.unwrap_err();

    assert!(matches!(err, AppError::Push(PushError::Backend(_))));
    assert_eq!(err.exit_code(), 1);

    let status = agent.status().await.unwrap();
    assert_eq!(status["registered"], false);
    assert_eq!(status["platform_token"], "[REDACTED]");
    assert!(status["backend_token"].is_null());
}

#[tokio::test]
async fn test_missing_platform_token_means_unavailable() {
    let backend = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let mut config = test_config(&backend, data_dir.path());
    config.device.platform_token = None;

    let agent = Agent::from_config(&config).unwrap();
    let params = config.registration.to_parameters().unwrap();
    let err = agent.register(&params).await.unwrap_err();

    assert!(matches!(err, AppError::Push(PushError::PlatformUnavailable)));
    assert!(backend.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_is_validation_error() {
    let backend = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();
    let mut config = test_config(&backend, data_dir.path());
    config.registration.platform_secret = None;

    let agent = Agent::from_config(&config).unwrap();
    let params = config.registration.to_parameters().unwrap();
    let err = agent.register(&params).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(!data_dir.path().join("preferences.json").exists());
}
