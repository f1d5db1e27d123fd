//! Error types for homestead-core

use thiserror::Error;

/// Result type alias using homestead-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in homestead-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No caller identity was supplied for a mutation
    #[error("Not authenticated: a signed-in user is required")]
    NotAuthenticated,

    /// Offline update/delete on a record the local cache does not hold
    #[error("Record not found in offline cache: {collection}/{id}")]
    NotFoundInCache { collection: String, id: String },

    /// Remote store or network failure
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Durable storage refused a write because it would exceed its quota
    #[error("Storage quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found_in_cache(collection: &str, id: impl ToString) -> Self {
        Self::NotFoundInCache {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the error is a storage quota rejection.
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

impl From<crate::remote::RemoteError> for Error {
    fn from(error: crate::remote::RemoteError) -> Self {
        Self::RemoteUnavailable(error.to_string())
    }
}

impl From<crate::sync::FeedError> for Error {
    fn from(error: crate::sync::FeedError) -> Self {
        Self::RemoteUnavailable(error.to_string())
    }
}
