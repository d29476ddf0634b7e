//! Error types for the revindex store.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RevIndexError>;

/// All errors surfaced by the store and its components.
#[derive(Error, Debug)]
pub enum RevIndexError {
    /// The data file or sidecar could not be opened, grown, read, written or flushed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot or configuration blob could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The codec rejected a buffer.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// A record reachable from the directory is not valid.
    #[error("Corrupt record at offset {offset}: {message}")]
    Corruption { offset: u64, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RevIndexError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        RevIndexError::Decode(msg.into())
    }

    pub fn corruption<S: Into<String>>(offset: u64, msg: S) -> Self {
        RevIndexError::Corruption {
            offset,
            message: msg.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        RevIndexError::InvalidArgument(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RevIndexError::InvalidConfig(msg.into())
    }

    /// Whether this error indicates damaged on-disk data rather than an
    /// environment or caller problem.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            RevIndexError::Corruption { .. } | RevIndexError::Decode(_)
        )
    }
}
