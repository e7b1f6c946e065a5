//! Device-state reconciliation for mobile push registration.
//!
//! Three engines keep the platform push token, the backend device
//! registration and the monitored geofences consistent with the caller's
//! desired configuration, using a persisted [`RegistrationRecord`] as the
//! memory of what was last reconciled:
//!
//! - [`RegistrationEngine`] obtains tokens and creates or updates the
//!   backend registration only when something actually changed.
//! - [`UnregistrationEngine`] tears all of that down again.
//! - [`GeofenceEngine`] merges server deltas into the stored geofence set and
//!   arms the tag-matching subset on the device monitor.
//!
//! All side effects go through the traits in [`ports`].

mod error;
pub mod geofence;
mod listener;
pub mod memory;
mod params;
pub mod ports;
mod record;
mod registration;
mod unregistration;

pub use error::*;
pub use geofence::{
    GeofenceData, GeofenceDataList, GeofenceEngine, GeofenceLocationMap, GeofenceRegion,
    GeofenceResponseData, GeofenceUpdater, Location, LocationKey, TriggerType,
};
pub use listener::{RegistrationListener, UnregistrationListener};
pub use params::*;
pub use record::*;
pub use registration::{
    decide_backend_action, platform_registration_required, BackendAction, RegistrationEngine,
};
pub use unregistration::UnregistrationEngine;
