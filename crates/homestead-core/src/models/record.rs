//! Cached record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix reserved for ids minted while offline.
///
/// Remote-assigned ids never start with this prefix.
pub const TEMP_ID_PREFIX: &str = "offline_";

/// Domain object stored in a record (task, plant, project, event ...)
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identifier of a record, either remote-canonical or locally temporary
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an id handed out by the remote store
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a temporary id for a record created while offline
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Whether this id was minted locally and is unknown to the remote store
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(
                "record id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity of the signed-in caller that owns queued operations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as held by the local cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord {
    /// Collection the record belongs to (e.g. `tasks`, `plants`)
    pub collection: String,
    /// Record id, temporary until the create is confirmed remotely
    pub id: RecordId,
    /// Opaque domain object
    pub data: Payload,
    /// Last update timestamp (Unix ms), used for last-write-wins
    pub updated_at: i64,
}

impl CachedRecord {
    pub fn new(collection: impl Into<String>, id: RecordId, data: Payload, updated_at: i64) -> Self {
        Self {
            collection: collection.into(),
            id,
            data,
            updated_at,
        }
    }

    /// Build a cache entry from a record returned by the remote store
    pub fn from_remote(collection: &str, remote: RemoteRecord) -> Self {
        let updated_at = remote.updated_at.unwrap_or_else(now_millis);
        Self::new(collection, remote.id, remote.data, updated_at)
    }

    /// Shallow-merge `changes` over this record's payload
    pub fn merge(&mut self, changes: &Payload) {
        for (key, value) in changes {
            self.data.insert(key.clone(), value.clone());
        }
    }
}

/// A record as returned by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: RecordId,
    #[serde(default)]
    pub data: Payload,
    /// Server timestamp (Unix ms); absent when the store does not report one
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Current Unix timestamp in milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
