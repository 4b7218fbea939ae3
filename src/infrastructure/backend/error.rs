use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Created record has no id")]
    MissingId,

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(e) if e.is_timeout() => AppError::Timeout(e.to_string()),
            BackendError::Request(e) => AppError::Network(e.to_string()),
            BackendError::InvalidUrl(msg) => AppError::ConfigurationError(msg),
            other => AppError::Backend(other.to_string()),
        }
    }
}
