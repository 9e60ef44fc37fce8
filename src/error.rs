//! Error types for the courier bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the courier bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Protocol session error
    #[error("session error: {0}")]
    Session(String),

    /// Media download/handling error
    #[error("media error: {0}")]
    Media(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// A record with this message identifier already exists.
    /// Callers on the persistence path treat this as a benign duplicate.
    #[error("duplicate message: {0}")]
    DuplicateMessage(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is the benign duplicate-message outcome
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateMessage(_))
    }
}
