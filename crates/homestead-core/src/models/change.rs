//! Push-channel change and record event models

use serde::{Deserialize, Serialize};

use super::record::{CachedRecord, Payload, RecordId};

/// Kind of document-level change delivered by the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

/// One entry of a push-channel notification batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    #[serde(rename = "type")]
    pub change: ChangeType,
    pub id: RecordId,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Typed event forwarded to subscribers after the cache has been updated
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    Added {
        record: CachedRecord,
    },
    Modified {
        record: CachedRecord,
        /// Value cached before this change, if any
        old_record: Option<CachedRecord>,
    },
    Removed {
        /// Last value known to the cache
        record: CachedRecord,
    },
}

impl RecordEvent {
    pub const fn change_type(&self) -> ChangeType {
        match self {
            Self::Added { .. } => ChangeType::Added,
            Self::Modified { .. } => ChangeType::Modified,
            Self::Removed { .. } => ChangeType::Removed,
        }
    }

    pub const fn record(&self) -> &CachedRecord {
        match self {
            Self::Added { record } | Self::Modified { record, .. } | Self::Removed { record } => {
                record
            }
        }
    }
}
