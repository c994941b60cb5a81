//! Error types for prospecta.

use thiserror::Error;

/// Result type alias using prospecta's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for prospecta operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Work item (account/prospect) not found
    #[error("Work item not found: {0}")]
    ItemNotFound(uuid::Uuid),

    /// The research service asked the caller to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Enrichment call failed for a non-rate-limit reason
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Job pipeline error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
