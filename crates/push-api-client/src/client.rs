//! Push backend HTTP client.

use crate::error::ApiError;
use crate::types::*;
use async_trait::async_trait;
use push_engine::ports::{
    BackendRegistration, BackendRegistrationApi, GeofenceUpdateApi, RegistrationPayload,
};
use push_engine::{
    BackendError, CertificateValidation, Credentials, GeofenceResponseData, SyncTimestamp,
};
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the backend registration and geofence endpoints.
///
/// The service URL, credentials and certificate mode travel with every call,
/// so one client serves any number of backends.
#[derive(Clone)]
pub struct PushApiClient {
    client: Client,
    trust_all_client: Client,
    timeout: Duration,
}

impl PushApiClient {
    /// Create a new client with the default timeout.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let trust_all_client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            trust_all_client,
            timeout,
        })
    }

    fn http_client(&self, mode: &CertificateValidation) -> Result<Client, ApiError> {
        match mode {
            CertificateValidation::Default => Ok(self.client.clone()),
            CertificateValidation::TrustAll => {
                warn!("Certificate validation disabled for this request");
                Ok(self.trust_all_client.clone())
            }
            CertificateValidation::Pinned(certs) => {
                let mut builder = Client::builder()
                    .timeout(self.timeout)
                    .tls_built_in_root_certs(false);
                for cert in certs {
                    builder = builder.add_root_certificate(parse_certificate(cert)?);
                }
                Ok(builder.build()?)
            }
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        credentials: &Credentials,
        segments: &[&str],
    ) -> Result<RequestBuilder, ApiError> {
        let url = endpoint(&credentials.service_url, segments)?;
        debug!(method = %method, url = %url, "Sending push API request");

        Ok(self
            .http_client(&credentials.certificate_validation)?
            .request(method, url)
            .basic_auth(&credentials.platform_uuid, Some(credentials.platform_secret.expose_secret())))
    }

    /// Register a device.
    #[instrument(skip(self, request, credentials), fields(service_url = %credentials.service_url))]
    pub async fn create_registration(
        &self,
        credentials: &Credentials,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        let response = self
            .request(reqwest::Method::POST, credentials, &["v1", "registration"])?
            .json(request)
            .send()
            .await?;

        parse_json(check_status(response, "Create registration").await?).await
    }

    /// Update an existing device registration.
    #[instrument(skip(self, request, credentials), fields(service_url = %credentials.service_url))]
    pub async fn update_registration(
        &self,
        credentials: &Credentials,
        device_uuid: &str,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                credentials,
                &["v1", "registration", device_uuid],
            )?
            .json(request)
            .send()
            .await?;

        parse_json(check_status(response, "Update registration").await?).await
    }

    /// Delete a device registration.
    #[instrument(skip(self, credentials), fields(service_url = %credentials.service_url))]
    pub async fn delete_registration(
        &self,
        credentials: &Credentials,
        device_uuid: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                credentials,
                &["v1", "registration", device_uuid],
            )?
            .send()
            .await?;

        check_status(response, "Delete registration").await?;
        debug!("Registration deleted");
        Ok(())
    }

    /// Fetch geofences changed since `since`. `None` means nothing changed.
    #[instrument(skip(self, credentials), fields(service_url = %credentials.service_url))]
    pub async fn fetch_geofences(
        &self,
        credentials: &Credentials,
        device_uuid: &str,
        since: SyncTimestamp,
    ) -> Result<Option<GeofenceUpdateResponse>, ApiError> {
        let response = self
            .request(reqwest::Method::GET, credentials, &["v1", "geofences"])?
            .query(&[
                ("timestamp", since.as_millis().to_string()),
                ("device_uuid", device_uuid.to_string()),
            ])
            .send()
            .await?;

        let response = check_status(response, "Fetch geofences").await?;
        if response.status() == StatusCode::NO_CONTENT {
            debug!("No geofence changes");
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl BackendRegistrationApi for PushApiClient {
    async fn create(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<BackendRegistration, BackendError> {
        let response = self
            .create_registration(&payload.credentials, &payload.into())
            .await?;
        Ok(BackendRegistration {
            device_uuid: response.device_uuid,
        })
    }

    async fn update(
        &self,
        backend_id: &str,
        payload: &RegistrationPayload,
    ) -> Result<BackendRegistration, BackendError> {
        let response = self
            .update_registration(&payload.credentials, backend_id, &payload.into())
            .await?;
        Ok(BackendRegistration {
            device_uuid: response.device_uuid,
        })
    }

    async fn delete(&self, backend_id: &str, credentials: &Credentials) -> Result<(), BackendError> {
        Ok(self.delete_registration(credentials, backend_id).await?)
    }
}

#[async_trait]
impl GeofenceUpdateApi for PushApiClient {
    async fn fetch_geofence_update(
        &self,
        credentials: &Credentials,
        backend_id: &str,
        since: SyncTimestamp,
    ) -> Result<Option<GeofenceResponseData>, BackendError> {
        let update = self.fetch_geofences(credentials, backend_id, since).await?;
        Ok(update.map(GeofenceResponseData::try_from).transpose()?)
    }
}

/// Append path segments to the service URL, keeping any base path.
fn endpoint(service_url: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = Url::parse(service_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base", service_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_certificate(bytes: &[u8]) -> Result<Certificate, ApiError> {
    let parsed = if bytes.starts_with(b"-----BEGIN") {
        Certificate::from_pem(bytes)
    } else {
        Certificate::from_der(bytes)
    };
    parsed.map_err(|e| ApiError::Certificate(e.to_string()))
}

async fn check_status(response: Response, operation: &str) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "{} failed", operation);
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn parse_json<T: serde::de::DeserializeOwned + Default>(
    response: Response,
) -> Result<T, ApiError> {
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("https://push.example.com/ag-push/", &["v1", "registration"]).unwrap();
        assert_eq!(url.as_str(), "https://push.example.com/ag-push/v1/registration");

        let url = endpoint("https://push.example.com", &["v1", "registration", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://push.example.com/v1/registration/a%20b");
    }

    #[test]
    fn test_endpoint_rejects_bad_url() {
        assert!(matches!(
            endpoint("not a url", &["v1"]),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            endpoint("mailto:ops@example.com", &["v1"]),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
