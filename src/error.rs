//! Error types for qrouter

use thiserror::Error;

/// Result type alias for qrouter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in qrouter
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reasoning error: {0}")]
    Reasoning(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Query engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
