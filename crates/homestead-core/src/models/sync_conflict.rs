//! Sync conflict models

use serde::{Deserialize, Serialize};

use super::record::{CachedRecord, RecordId};

/// Which copy of a record survived conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSide {
    Local,
    Remote,
}

/// Outcome of resolving one local/remote pair; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictDecision {
    /// Record written back into the cache
    pub record: CachedRecord,
    pub winner: ConflictSide,
    /// False when both copies carried the same timestamp
    pub had_conflict: bool,
}

/// Recorded sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub collection: String,
    /// Record involved in the conflict
    pub record_id: RecordId,
    /// Locally held copy's timestamp
    pub local_updated_at: i64,
    /// Incoming copy's timestamp
    pub remote_updated_at: i64,
    pub winner: ConflictSide,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
