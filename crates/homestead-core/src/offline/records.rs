//! Local record cache operations

use std::collections::BTreeMap;

use super::OfflineStore;
use crate::models::{CachedRecord, RecordId};

impl OfflineStore {
    /// Store a record under its collection and id, replacing any previous value.
    pub async fn put(&self, record: CachedRecord) {
        let mut state = self.lock().await;
        state
            .records
            .entry(record.collection.clone())
            .or_default()
            .insert(record.id.clone(), record);
        self.persist(&mut state);
    }

    /// Fetch a cached record; absent keys yield `None`, never an error.
    pub async fn get(&self, collection: &str, id: &RecordId) -> Option<CachedRecord> {
        let state = self.lock().await;
        let id = state.resolve_alias(id);
        state
            .records
            .get(collection)
            .and_then(|records| records.get(&id))
            .cloned()
    }

    /// All cached records of a collection keyed by id
    pub async fn get_all(&self, collection: &str) -> BTreeMap<RecordId, CachedRecord> {
        self.lock()
            .await
            .records
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a cached record, returning the last known value.
    pub async fn remove(&self, collection: &str, id: &RecordId) -> Option<CachedRecord> {
        let mut state = self.lock().await;
        let id = state.resolve_alias(id);
        let removed = state
            .records
            .get_mut(collection)
            .and_then(|records| records.remove(&id));
        if removed.is_some() {
            self.persist(&mut state);
        }
        removed
    }

    /// Drop every cached record.
    ///
    /// Range coverage goes with them, since it would otherwise claim records
    /// that are no longer stored. The outbox is left untouched.
    pub async fn clear(&self) {
        let mut state = self.lock().await;
        state.records.clear();
        state.ranges.clear();
        self.persist(&mut state);
    }
}
