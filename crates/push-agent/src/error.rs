//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("{0}")]
    Push(#[from] push_engine::PushError),

    #[error("Geofence error: {0}")]
    Geofence(#[from] push_engine::GeofenceError),

    #[error("Storage error: {0}")]
    Store(#[from] push_engine::StoreError),

    #[error("Push API client error: {0}")]
    Api(#[from] push_api_client::ApiError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    /// Process exit code: 2 for invalid input, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Push(e) if e.is_validation() => 2,
            _ => 1,
        }
    }
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
