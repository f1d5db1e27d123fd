//! Pending operation model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::{Payload, RecordId, UserId};

/// Unique id of a queued operation, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of mutation waiting to be replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation handed to the outbox; id and timestamp are assigned on enqueue
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: RecordId,
    pub data: Option<Payload>,
    pub user_id: UserId,
}

impl NewOperation {
    pub fn create(collection: &str, id: RecordId, data: Payload, user_id: &UserId) -> Self {
        Self {
            kind: OperationKind::Create,
            collection: collection.to_string(),
            document_id: id,
            data: Some(data),
            user_id: user_id.clone(),
        }
    }

    pub fn update(collection: &str, id: RecordId, changes: Payload, user_id: &UserId) -> Self {
        Self {
            kind: OperationKind::Update,
            collection: collection.to_string(),
            document_id: id,
            data: Some(changes),
            user_id: user_id.clone(),
        }
    }

    pub fn delete(collection: &str, id: RecordId, user_id: &UserId) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection: collection.to_string(),
            document_id: id,
            data: None,
            user_id: user_id.clone(),
        }
    }
}

/// A mutation not yet confirmed by the remote store.
///
/// Never mutated in place: it is enqueued once and removed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    pub user_id: UserId,
    /// Capture time (Unix ms), strictly increasing across the queue
    pub timestamp: i64,
}

impl PendingOperation {
    pub(crate) fn from_new(op: NewOperation, timestamp: i64) -> Self {
        Self {
            id: OperationId::new(),
            kind: op.kind,
            collection: op.collection,
            document_id: op.document_id,
            data: op.data,
            user_id: op.user_id,
            timestamp,
        }
    }
}
