//! Outbox queue operations and the local-only mutation path

use super::{OfflineState, OfflineStore};
use crate::error::{Error, Result};
use crate::models::{
    now_millis, CachedRecord, NewOperation, OperationId, Payload, PendingOperation, RecordId,
    RemoteRecord, UserId,
};

impl OfflineState {
    fn push_operation(&mut self, op: NewOperation) -> PendingOperation {
        let now = now_millis();
        let timestamp = self
            .outbox
            .last()
            .map_or(now, |last| now.max(last.timestamp + 1));
        let pending = PendingOperation::from_new(op, timestamp);
        self.outbox.push(pending.clone());
        pending
    }
}

impl OfflineStore {
    /// Append an operation to the end of the queue.
    ///
    /// Operations are never reordered or deduplicated.
    pub async fn enqueue(&self, op: NewOperation) -> PendingOperation {
        let mut state = self.lock().await;
        let pending = state.push_operation(op);
        self.persist(&mut state);
        tracing::debug!(
            "Queued {} for {}/{} ({})",
            pending.kind,
            pending.collection,
            pending.document_id,
            pending.id
        );
        pending
    }

    /// Every queued operation, oldest first
    pub async fn list_pending(&self) -> Vec<PendingOperation> {
        self.lock().await.outbox.clone()
    }

    /// Queued operations owned by `user_id`, oldest first
    pub async fn list_pending_for(&self, user_id: &UserId) -> Vec<PendingOperation> {
        self.lock()
            .await
            .outbox
            .iter()
            .filter(|op| &op.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.lock().await.outbox.len()
    }

    /// Whether the record has local changes the remote store has not confirmed
    pub async fn has_pending(&self, collection: &str, id: &RecordId) -> bool {
        let state = self.lock().await;
        let id = state.resolve_alias(id);
        state.outbox.iter().any(|op| {
            op.collection == collection && state.resolve_alias(&op.document_id) == id
        })
    }

    /// Remove one operation by id, keeping the relative order of the rest.
    pub async fn remove_operation(&self, op_id: OperationId) -> bool {
        let mut state = self.lock().await;
        let before = state.outbox.len();
        state.outbox.retain(|op| op.id != op_id);
        let removed = state.outbox.len() != before;
        if removed {
            self.persist(&mut state);
        }
        removed
    }

    /// Create a record locally under a temporary id and queue its creation.
    pub(crate) async fn create_local(
        &self,
        collection: &str,
        data: Payload,
        user_id: &UserId,
    ) -> CachedRecord {
        let record = CachedRecord::new(collection, RecordId::temporary(), data.clone(), now_millis());

        let mut state = self.lock().await;
        state
            .records
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        state.push_operation(NewOperation::create(
            collection,
            record.id.clone(),
            data,
            user_id,
        ));
        self.persist(&mut state);
        record
    }

    /// Merge `changes` into a cached record and queue the update.
    pub(crate) async fn update_local(
        &self,
        collection: &str,
        id: &RecordId,
        changes: Payload,
        user_id: &UserId,
    ) -> Result<CachedRecord> {
        let mut state = self.lock().await;
        let id = state.resolve_alias(id);
        let record = {
            let record = state
                .records
                .get_mut(collection)
                .and_then(|records| records.get_mut(&id))
                .ok_or_else(|| Error::not_found_in_cache(collection, &id))?;
            record.merge(&changes);
            record.updated_at = now_millis();
            record.clone()
        };
        state.push_operation(NewOperation::update(collection, id, changes, user_id));
        self.persist(&mut state);
        Ok(record)
    }

    /// Remove a cached record and queue its deletion.
    pub(crate) async fn delete_local(
        &self,
        collection: &str,
        id: &RecordId,
        user_id: &UserId,
    ) -> Result<CachedRecord> {
        let mut state = self.lock().await;
        let id = state.resolve_alias(id);
        let removed = state
            .records
            .get_mut(collection)
            .and_then(|records| records.remove(&id))
            .ok_or_else(|| Error::not_found_in_cache(collection, &id))?;
        state.push_operation(NewOperation::delete(collection, id, user_id));
        self.persist(&mut state);
        Ok(removed)
    }

    /// Settle a replayed `create`: dequeue it and move the cached record from
    /// its temporary id to the id the remote store assigned.
    pub(crate) async fn complete_create(&self, op: &PendingOperation, remote: &RemoteRecord) {
        let mut state = self.lock().await;
        state.outbox.retain(|queued| queued.id != op.id);

        let temp_id = &op.document_id;
        if let Some(records) = state.records.get_mut(&op.collection) {
            if let Some(mut local) = records.remove(temp_id) {
                local.id = remote.id.clone();
                records.insert(remote.id.clone(), local);
            }
        }
        if temp_id.is_temporary() {
            state.id_aliases.insert(temp_id.clone(), remote.id.clone());
        }
        self.persist(&mut state);
    }
}
