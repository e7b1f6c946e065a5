//! Push API client errors.

use push_engine::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
}

impl From<ApiError> for BackendError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status { status, body } => BackendError::Rejected { status, body },
            ApiError::Json(e) => BackendError::Decode(e.to_string()),
            ApiError::InvalidResponse(reason) => BackendError::Decode(reason),
            other => BackendError::Transport(other.to_string()),
        }
    }
}
