//! Error types for the remote gateway.

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong talking to the backend. Each workflow step
/// (insert, upload, patch, delete) fails independently with one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend rejected request ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("backend returned no record")]
    MissingRecord,

    #[error("invalid file extension: {0:?}")]
    InvalidExtension(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing configuration: {0}")]
    Config(&'static str),
}
