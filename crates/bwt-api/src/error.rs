//! API client errors

use thiserror::Error;

/// Errors returned by the device API clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error talking to device: {0}")]
    Http(#[from] reqwest::Error),

    #[error("device rejected the access code")]
    AccessDenied,

    #[error("device returned status {0}")]
    Status(u16),

    #[error("could not decode device response: {0}")]
    Decode(#[from] serde_json::Error),
}
