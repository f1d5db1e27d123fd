//! Contract for the authoritative remote store.

mod http;

pub use http::HttpRemoteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Payload, RecordId, RemoteRecord, TimeRange};

/// Broad class of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Caller lacks permission (or its token was rejected)
    Permission,
    /// Network unreachable, timeout, or connection reset
    Network,
    /// The addressed record does not exist remotely
    NotFound,
    /// Any other non-success response from the store
    Api,
    /// The response could not be decoded
    Decode,
}

/// Rejection from a remote-store call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Authoritative store of household records.
///
/// Each call is assumed atomic; `create` assigns the canonical id.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create(&self, collection: &str, payload: &Payload) -> RemoteResult<RemoteRecord>;

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        changes: &Payload,
    ) -> RemoteResult<RemoteRecord>;

    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()>;

    async fn get(&self, collection: &str, id: &RecordId) -> RemoteResult<Option<RemoteRecord>>;

    /// Records of `collection` whose time falls in `[range.start, range.end)`
    async fn query_range(&self, collection: &str, range: TimeRange)
        -> RemoteResult<Vec<RemoteRecord>>;
}
