//! Advisor error types.

use thiserror::Error;

/// Failures of the key-value persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures calling a remote advice generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Generator returned no text")]
    EmptyResponse,

    #[error("Invalid API key for {0}")]
    InvalidApiKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
