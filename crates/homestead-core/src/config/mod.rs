//! Engine configuration.
//!
//! Provides `EngineConfig`, the tunables shared by the offline store, the
//! router, and the drainer. Every field has a default so a partial JSON
//! document (or none at all) is a valid configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_STORAGE_KEY: &str = "homestead_offline_data";
const DEFAULT_RANGE_FIELD: &str = "date";

/// Tunables for the offline engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Key under which the whole offline state blob is persisted
    pub storage_key: String,
    /// Outbox entries older than this are dropped when storage is full
    pub outbox_retention_days: u32,
    /// Number of drain failures kept for diagnostics
    pub error_history_limit: usize,
    /// Number of resolved conflicts kept for diagnostics
    pub conflict_history_limit: usize,
    /// Payload field holding each range-queried collection's timestamp
    pub range_fields: BTreeMap<String, String>,
    /// Drain the outbox automatically when connectivity returns
    pub auto_drain: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let range_fields = [("events", "start"), ("tasks", "due"), ("plants", "nextWatering")]
            .into_iter()
            .map(|(collection, field)| (collection.to_string(), field.to_string()))
            .collect();

        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            outbox_retention_days: 7,
            error_history_limit: 50,
            conflict_history_limit: 50,
            range_fields,
            auto_drain: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON payload and validate it.
    pub fn from_json(payload: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(payload)?;
        config.normalize()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when absent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Payload field used to place a record of `collection` on the timeline
    pub fn range_field(&self, collection: &str) -> &str {
        self.range_fields
            .get(collection)
            .map_or(DEFAULT_RANGE_FIELD, String::as_str)
    }

    /// Outbox retention window in milliseconds
    pub fn outbox_retention_millis(&self) -> i64 {
        i64::from(self.outbox_retention_days) * 24 * 60 * 60 * 1000
    }

    fn normalize(&mut self) -> Result<()> {
        self.storage_key = normalize_text_option(Some(self.storage_key.clone()))
            .ok_or_else(|| Error::InvalidInput("storage_key must not be empty".to_string()))?;
        if self.error_history_limit == 0 {
            return Err(Error::InvalidInput(
                "error_history_limit must be positive".to_string(),
            ));
        }
        if self.conflict_history_limit == 0 {
            return Err(Error::InvalidInput(
                "conflict_history_limit must be positive".to_string(),
            ));
        }

        let mut range_fields = BTreeMap::new();
        for (collection, field) in std::mem::take(&mut self.range_fields) {
            let (Some(collection), Some(field)) = (
                normalize_text_option(Some(collection)),
                normalize_text_option(Some(field)),
            ) else {
                return Err(Error::InvalidInput(
                    "range_fields entries must not be empty".to_string(),
                ));
            };
            range_fields.insert(collection, field);
        }
        self.range_fields = range_fields;
        Ok(())
    }
}
