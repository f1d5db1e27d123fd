//! Offline store: the local record cache, the outbox queue, the range index,
//! and sync metadata, persisted together as one blob.
//!
//! Every mutating call takes the state lock, mutates, persists the whole
//! state, and releases the lock without awaiting anything else, so callers
//! never observe a half-applied write.

mod outbox;
mod ranges;
mod records;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::config::EngineConfig;
use crate::models::{
    now_millis, CachedRecord, PendingOperation, RecordId, SyncConflict, SyncErrorEntry, TimeRange,
};
use crate::storage::DurableStorage;

/// Version written into the persisted blob
const STATE_VERSION: u32 = 1;

/// Everything the offline engine persists, serialized under one storage key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct OfflineState {
    version: u32,
    records: BTreeMap<String, BTreeMap<RecordId, CachedRecord>>,
    outbox: Vec<PendingOperation>,
    ranges: BTreeMap<String, Vec<TimeRange>>,
    id_aliases: BTreeMap<RecordId, RecordId>,
    last_sync_at: Option<i64>,
    sync_errors: VecDeque<SyncErrorEntry>,
    conflicts: VecDeque<SyncConflict>,
}

impl OfflineState {
    /// Drop failure entries whose operation is no longer queued; returns how
    /// many went
    fn settle_sync_errors(&mut self) -> usize {
        let before = self.sync_errors.len();
        let outbox = &self.outbox;
        self.sync_errors
            .retain(|entry| outbox.iter().any(|op| op.id == entry.operation_id));
        before - self.sync_errors.len()
    }

    /// Drop outbox entries captured before `cutoff`; returns how many went
    fn prune_outbox(&mut self, cutoff: i64) -> usize {
        let before = self.outbox.len();
        self.outbox.retain(|op| op.timestamp >= cutoff);
        before - self.outbox.len()
    }

    fn resolve_alias(&self, id: &RecordId) -> RecordId {
        // Aliases only ever point from a temporary id to a canonical one.
        self.id_aliases.get(id).cloned().unwrap_or_else(|| id.clone())
    }
}

/// Process-wide offline store with injected durable storage.
pub struct OfflineStore {
    storage: Arc<dyn DurableStorage>,
    config: EngineConfig,
    state: Mutex<OfflineState>,
}

impl OfflineStore {
    /// Open the store, loading any previously persisted state.
    ///
    /// Unreadable or undecodable state is logged and replaced by an empty one.
    pub fn open(storage: Arc<dyn DurableStorage>, config: EngineConfig) -> Self {
        let state = match storage.read(&config.storage_key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<OfflineState>(&bytes) {
                Ok(state) => {
                    tracing::debug!(
                        "Loaded offline state: {} collections, {} pending operations",
                        state.records.len(),
                        state.outbox.len()
                    );
                    state
                }
                Err(error) => {
                    tracing::warn!("Discarding undecodable offline state: {error}");
                    OfflineState::default()
                }
            },
            Ok(None) => OfflineState::default(),
            Err(error) => {
                tracing::warn!("Failed to read offline state, starting empty: {error}");
                OfflineState::default()
            }
        };

        Self {
            storage,
            config,
            state: Mutex::new(state),
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn lock(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().await
    }

    /// Persist the full state.
    ///
    /// On a quota failure, outbox entries older than the retention window are
    /// pruned and the write is retried once; if that also fails the write is
    /// dropped and logged.
    fn persist(&self, state: &mut OfflineState) {
        match self.write_state(state) {
            Ok(()) => {}
            Err(error) if error.is_quota_exceeded() => {
                let cutoff = now_millis() - self.config.outbox_retention_millis();
                let pruned = state.prune_outbox(cutoff);
                tracing::warn!(
                    "Offline storage quota exceeded; pruned {pruned} stale outbox entries and retrying"
                );
                if let Err(error) = self.write_state(state) {
                    tracing::error!("Dropping offline state write after pruning: {error}");
                }
            }
            Err(error) => {
                tracing::error!("Dropping offline state write: {error}");
            }
        }
    }

    fn write_state(&self, state: &mut OfflineState) -> crate::Result<()> {
        state.version = STATE_VERSION;
        let bytes = serde_json::to_vec(state)?;
        self.storage.write(&self.config.storage_key, &bytes)?;
        tracing::debug!("Persisted offline state ({} bytes)", bytes.len());
        Ok(())
    }

    /// Write the current state to durable storage (used at shutdown).
    pub async fn flush(&self) {
        let mut state = self.lock().await;
        self.persist(&mut state);
    }

    /// Discard all offline data, including unsynced operations.
    pub async fn clear_offline_data(&self) {
        let mut state = self.lock().await;
        let dropped = state.outbox.len();
        *state = OfflineState::default();
        self.persist(&mut state);
        tracing::info!("Cleared offline data ({dropped} unsynced operations discarded)");
    }

    /// When the last drain pass finished (unix ms)
    pub async fn last_sync_at(&self) -> Option<i64> {
        self.lock().await.last_sync_at
    }

    pub(crate) async fn set_last_sync_at(&self, timestamp: i64) {
        let mut state = self.lock().await;
        state.last_sync_at = Some(timestamp);
        self.persist(&mut state);
    }

    /// Recent drain failures, oldest first
    pub async fn sync_errors(&self) -> Vec<SyncErrorEntry> {
        self.lock().await.sync_errors.iter().cloned().collect()
    }

    /// Record a failed replay, replacing any earlier failure of the same
    /// operation.
    pub(crate) async fn record_sync_error(&self, entry: SyncErrorEntry) {
        let mut state = self.lock().await;
        state
            .sync_errors
            .retain(|existing| existing.operation_id != entry.operation_id);
        state.sync_errors.push_back(entry);
        while state.sync_errors.len() > self.config.error_history_limit {
            state.sync_errors.pop_front();
        }
        self.persist(&mut state);
    }

    /// Forget failures whose operation has since left the outbox.
    pub(crate) async fn settle_sync_errors(&self) {
        let mut state = self.lock().await;
        if state.settle_sync_errors() > 0 {
            self.persist(&mut state);
        }
    }

    /// Recently resolved conflicts, newest first
    pub async fn conflicts(&self, limit: usize) -> Vec<SyncConflict> {
        self.lock()
            .await
            .conflicts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) async fn record_conflict(&self, conflict: SyncConflict) {
        let mut state = self.lock().await;
        state.conflicts.push_back(conflict);
        while state.conflicts.len() > self.config.conflict_history_limit {
            state.conflicts.pop_front();
        }
        self.persist(&mut state);
    }

    /// Canonical id for `id`, following temp → canonical aliases
    pub async fn resolve_alias(&self, id: &RecordId) -> RecordId {
        self.lock().await.resolve_alias(id)
    }
}
