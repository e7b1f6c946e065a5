//! Wire types of the push backend API.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use push_engine::ports::RegistrationPayload;
use push_engine::{
    GeofenceData, GeofenceResponseData, Location, SyncTimestamp, TagSet, TriggerType,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Body of a create or update call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub variant_uuid: String,
    pub registration_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_user_id: Option<String>,
    pub package_name: String,
    pub device_manufacturer: String,
    pub device_model: String,
    pub os: String,
    pub os_version: String,
    pub tags: TagChanges,
}

/// Tag subscription changes carried by a registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagChanges {
    pub subscribe: Vec<String>,
    pub unsubscribe: Vec<String>,
}

fn tag_list(tags: &TagSet) -> Vec<String> {
    tags.iter().map(str::to_string).collect()
}

impl From<&RegistrationPayload> for RegistrationRequest {
    fn from(payload: &RegistrationPayload) -> Self {
        Self {
            variant_uuid: payload.credentials.platform_uuid.clone(),
            registration_token: payload.platform_token.expose_secret().clone(),
            device_alias: payload.device_alias.clone(),
            custom_user_id: payload.custom_user_id.clone(),
            package_name: payload.package_name.clone(),
            device_manufacturer: payload.device_manufacturer.clone(),
            device_model: payload.device_model.clone(),
            os: payload.os.clone(),
            os_version: payload.os_version.clone(),
            tags: TagChanges {
                subscribe: tag_list(&payload.subscribe_tags),
                unsubscribe: tag_list(&payload.unsubscribe_tags),
            },
        }
    }
}

/// Response of a create or update call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationResponse {
    #[serde(default)]
    pub device_uuid: Option<String>,
}

/// Geofence delta as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceUpdateResponse {
    pub last_modified: i64,
    #[serde(default)]
    pub geofences: Vec<WireGeofence>,
    #[serde(default)]
    pub deleted_geofence_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGeofence {
    pub id: i64,
    /// Milliseconds since the epoch.
    pub expiry_time: i64,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub locations: Vec<WireLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLocation {
    pub lat: f64,
    pub long: f64,
    pub rad: f64,
}

impl TryFrom<WireGeofence> for GeofenceData {
    type Error = ApiError;

    fn try_from(wire: WireGeofence) -> Result<Self, Self::Error> {
        let expiry = DateTime::<Utc>::from_timestamp_millis(wire.expiry_time).ok_or_else(|| {
            ApiError::InvalidResponse(format!(
                "geofence {} has out-of-range expiry {}",
                wire.id, wire.expiry_time
            ))
        })?;
        let trigger_type = wire.trigger_type;

        Ok(GeofenceData {
            id: wire.id,
            expiry,
            tag: wire.tag,
            locations: wire
                .locations
                .into_iter()
                .map(|l| Location {
                    latitude: l.lat,
                    longitude: l.long,
                    radius: l.rad,
                    trigger_type,
                })
                .collect(),
        })
    }
}

impl TryFrom<GeofenceUpdateResponse> for GeofenceResponseData {
    type Error = ApiError;

    fn try_from(wire: GeofenceUpdateResponse) -> Result<Self, Self::Error> {
        Ok(GeofenceResponseData {
            last_modified: SyncTimestamp::from_millis(wire.last_modified),
            geofences: wire
                .geofences
                .into_iter()
                .map(GeofenceData::try_from)
                .collect::<Result<_, _>>()?,
            deleted_geofence_ids: wire.deleted_geofence_ids,
        })
    }
}
