//! Chatvault error types

use thiserror::Error;

/// Chatvault error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error (network, timeout, unexpected API failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The chat service rejected an API call
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Challenge target is definitively inaccessible (deleted or never existed)
    #[error("challenge target not found")]
    ProbeNotFound,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export error
    #[error("Export error: {0}")]
    Export(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error is definitive evidence that a probed message is gone,
    /// as opposed to a transient failure that must not be read as deletion.
    pub fn is_probe_not_found(&self) -> bool {
        matches!(self, Error::ProbeNotFound)
    }
}

/// Result type alias for chatvault operations
pub type Result<T> = std::result::Result<T, Error>;
