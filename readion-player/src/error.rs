//! Error types for readion-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Nothing in playback is fatal: out-of-range positions are clamped and a
//! missing speech capability degrades to no-ops, so most variants here come
//! from the persistence side.

use thiserror::Error;

/// Main error type for readion-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors raised by shared code
    #[error(transparent)]
    Common(#[from] readion_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored value could not be parsed
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// The playback service is no longer running
    #[error("Playback service stopped")]
    ServiceStopped,
}

impl Error {
    /// Whether this error came from the persistence layer
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Common(readion_common::Error::Database(_)) | Error::InvalidData(_)
        )
    }
}

/// Convenience Result type using readion-player Error
pub type Result<T> = std::result::Result<T, Error>;
