//! Geofence model: server-defined regions, stored sets and armed projections.

mod engine;
mod updater;

pub use engine::GeofenceEngine;
pub use updater::GeofenceUpdater;

use crate::params::TagSet;
use crate::record::SyncTimestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// When a monitored location fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Enter,
    Exit,
    #[serde(alias = "enter_or_exit")]
    Both,
    /// Any value this client does not understand.
    #[serde(other)]
    Unrecognized,
}

/// One circular region of a geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres.
    pub radius: f64,
    pub trigger_type: TriggerType,
}

impl Location {
    /// A location the monitor can actually arm.
    pub fn is_usable(&self) -> bool {
        self.radius.is_finite()
            && self.radius > 0.0
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A server-assigned geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceData {
    pub id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub locations: Vec<Location>,
}

impl GeofenceData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Untagged geofences are always subscribed; tagged ones match case-insensitively.
    pub fn is_subscribed(&self, subscribed_tags: &TagSet) -> bool {
        match &self.tag {
            None => true,
            Some(tag) if tag.trim().is_empty() => true,
            Some(tag) => subscribed_tags.contains(tag),
        }
    }

    /// Drop unusable locations. Returns `None` when the geofence must be culled:
    /// expired, any unrecognized trigger type, or no usable location left.
    pub fn sanitized(mut self, now: DateTime<Utc>) -> Option<Self> {
        if self.is_expired(now) {
            return None;
        }
        if self
            .locations
            .iter()
            .any(|l| l.trigger_type == TriggerType::Unrecognized)
        {
            return None;
        }
        self.locations.retain(Location::is_usable);
        if self.locations.is_empty() {
            return None;
        }
        Some(self)
    }
}

/// Geofences keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<GeofenceData>", into = "Vec<GeofenceData>")]
pub struct GeofenceDataList(BTreeMap<i64, GeofenceData>);

impl GeofenceDataList {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert, replacing any geofence with the same id.
    pub fn insert(&mut self, geofence: GeofenceData) {
        self.0.insert(geofence.id, geofence);
    }

    pub fn remove(&mut self, id: i64) -> Option<GeofenceData> {
        self.0.remove(&id)
    }

    pub fn get(&self, id: i64) -> Option<&GeofenceData> {
        self.0.get(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeofenceData> {
        self.0.values()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.keys().copied().collect()
    }

    /// Apply a delta: its geofences replace same-id entries, then its
    /// deleted ids are removed.
    pub fn merged(&self, delta: &GeofenceResponseData) -> Self {
        let mut merged = self.clone();
        for geofence in &delta.geofences {
            merged.insert(geofence.clone());
        }
        for id in &delta.deleted_geofence_ids {
            merged.remove(*id);
        }
        merged
    }

    /// Remove expired and structurally invalid geofences.
    pub fn culled(self, now: DateTime<Utc>) -> Self {
        self.0
            .into_values()
            .filter_map(|g| g.sanitized(now))
            .collect()
    }

    /// Geofences whose tag is absent or in `subscribed_tags`.
    pub fn subscribed(&self, subscribed_tags: &TagSet) -> Self {
        self.iter()
            .filter(|g| g.is_subscribed(subscribed_tags))
            .cloned()
            .collect()
    }
}

impl FromIterator<GeofenceData> for GeofenceDataList {
    fn from_iter<I: IntoIterator<Item = GeofenceData>>(iter: I) -> Self {
        let mut list = GeofenceDataList::new();
        for geofence in iter {
            list.insert(geofence);
        }
        list
    }
}

impl From<Vec<GeofenceData>> for GeofenceDataList {
    fn from(geofences: Vec<GeofenceData>) -> Self {
        geofences.into_iter().collect()
    }
}

impl From<GeofenceDataList> for Vec<GeofenceData> {
    fn from(list: GeofenceDataList) -> Self {
        list.0.into_values().collect()
    }
}

/// A geofence delta fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeofenceResponseData {
    pub last_modified: SyncTimestamp,
    #[serde(default)]
    pub geofences: Vec<GeofenceData>,
    #[serde(default)]
    pub deleted_geofence_ids: Vec<i64>,
}

/// Identifies one location of one geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    pub geofence_id: i64,
    pub location_index: usize,
}

const REQUEST_ID_PREFIX: &str = "geofence";

impl LocationKey {
    pub fn new(geofence_id: i64, location_index: usize) -> Self {
        Self {
            geofence_id,
            location_index,
        }
    }

    /// Identifier handed to the platform monitor, e.g. `geofence_12_0`.
    pub fn request_id(&self) -> String {
        format!(
            "{}_{}_{}",
            REQUEST_ID_PREFIX, self.geofence_id, self.location_index
        )
    }

    /// Parse an identifier produced by [`LocationKey::request_id`].
    pub fn parse_request_id(request_id: &str) -> Option<Self> {
        let rest = request_id.strip_prefix(REQUEST_ID_PREFIX)?.strip_prefix('_')?;
        let (id, index) = rest.rsplit_once('_')?;
        Some(Self::new(id.parse().ok()?, index.parse().ok()?))
    }
}

/// A single region as submitted to the platform monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    pub request_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub trigger_type: TriggerType,
    pub expiry: DateTime<Utc>,
}

/// Projection of geofences into individually armed locations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceLocationMap(BTreeMap<LocationKey, GeofenceRegion>);

impl GeofenceLocationMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Expand every location of every geofence in `list`.
    pub fn from_list(list: &GeofenceDataList) -> Self {
        let mut map = Self::new();
        for geofence in list.iter() {
            for (index, location) in geofence.locations.iter().enumerate() {
                map.insert_location(geofence, index, location);
            }
        }
        map
    }

    /// Insert a single location of a geofence.
    pub fn insert_location(&mut self, geofence: &GeofenceData, index: usize, location: &Location) {
        let key = LocationKey::new(geofence.id, index);
        self.0.insert(
            key,
            GeofenceRegion {
                request_id: key.request_id(),
                latitude: location.latitude,
                longitude: location.longitude,
                radius: location.radius,
                trigger_type: location.trigger_type,
                expiry: geofence.expiry,
            },
        );
    }

    /// Build a map of keys only, e.g. from triggered request ids.
    pub fn from_request_ids<'a>(
        request_ids: impl IntoIterator<Item = &'a str>,
        list: &GeofenceDataList,
    ) -> Self {
        let mut map = Self::new();
        for key in request_ids
            .into_iter()
            .filter_map(LocationKey::parse_request_id)
        {
            if let Some(geofence) = list.get(key.geofence_id) {
                if let Some(location) = geofence.locations.get(key.location_index) {
                    map.insert_location(geofence, key.location_index, location);
                }
            }
        }
        map
    }

    pub fn contains(&self, key: &LocationKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &LocationKey) -> Option<&GeofenceRegion> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &LocationKey> {
        self.0.keys()
    }

    pub fn regions(&self) -> impl Iterator<Item = &GeofenceRegion> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
