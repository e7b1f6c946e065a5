//! HTTP client for the push backend registration and geofence APIs.

mod client;
mod error;
mod types;

pub use client::{PushApiClient, DEFAULT_TIMEOUT};
pub use error::ApiError;
pub use types::*;
