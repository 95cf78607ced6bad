//! Error types for the DDI reconciliation core
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation layer
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an invalid or forbidden input
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored identity token could not be parsed
    #[error("Invalid identity token: {0}")]
    InvalidToken(String),

    /// Neither reference nor identity search located a remote object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// More than one remote object claims the same identity token
    #[error("Identity conflict: objects of type {type_name} sharing identity {internal_id}: {references:?}")]
    IdentityConflict {
        /// Object type that was searched
        type_name: String,
        /// The identity token claimed by every match
        internal_id: String,
        /// References of all matching objects
        references: Vec<String>,
    },

    /// Attribute values of incompatible shape for the same key
    #[error("Attribute merge error on '{key}': {message}")]
    Merge {
        /// Attribute key
        key: String,
        /// What went wrong
        message: String,
    },

    /// Failure returned by the directory client
    #[error("Remote error ({client}): {message}")]
    Remote {
        /// Directory client name
        client: String,
        /// Error message
        message: String,
    },

    /// Record store errors
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid token error
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a merge error for a specific attribute key
    pub fn merge(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Merge {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a remote (directory client) error
    pub fn remote(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Create a record store error
    pub fn record_store(msg: impl Into<String>) -> Self {
        Self::RecordStore(msg.into())
    }

    /// Whether this error means the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
