//! Drain failure history model

use serde::{Deserialize, Serialize};

use super::operation::{OperationId, OperationKind, PendingOperation};
use super::record::RecordId;

/// A failed replay attempt kept for diagnostic display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorEntry {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: RecordId,
    pub message: String,
    /// When the failure happened (unix ms)
    pub occurred_at: i64,
}

impl SyncErrorEntry {
    pub fn for_operation(op: &PendingOperation, message: impl Into<String>, occurred_at: i64) -> Self {
        Self {
            operation_id: op.id,
            kind: op.kind,
            collection: op.collection.clone(),
            document_id: op.document_id.clone(),
            message: message.into(),
            occurred_at,
        }
    }
}
