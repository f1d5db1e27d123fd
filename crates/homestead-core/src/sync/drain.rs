//! Outbox replay against the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;
use crate::models::{
    now_millis, CachedRecord, OperationKind, Payload, PendingOperation, RecordId, SyncErrorEntry,
    UserId,
};
use crate::offline::OfflineStore;
use crate::remote::{RemoteError, RemoteErrorKind, RemoteStore};

/// Why a drain request did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainSkip {
    Offline,
    AlreadyRunning,
}

/// Outcome of one drain request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: Option<DrainSkip>,
}

impl DrainReport {
    const fn skipped(reason: DrainSkip) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: Some(reason),
        }
    }
}

/// Clears the running flag when a pass ends, including on panic.
struct DrainGuard(Arc<AtomicBool>);

impl DrainGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Replays queued operations in FIFO order, one pass at a time.
#[derive(Clone)]
pub struct SyncDrainer {
    store: Arc<OfflineStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Connectivity,
    running: Arc<AtomicBool>,
}

impl SyncDrainer {
    pub fn new(
        store: Arc<OfflineStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replay every operation owned by `user`, oldest first.
    ///
    /// A failed operation stays queued and is recorded in the error history;
    /// the pass continues with the next one. History entries for operations
    /// no longer queued are dropped at the end of the pass. `last_sync_at` is
    /// updated after every pass that ran, whatever its failures.
    pub async fn drain(&self, user: &UserId) -> DrainReport {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping drain while offline");
            return DrainReport::skipped(DrainSkip::Offline);
        }
        let Some(_guard) = DrainGuard::acquire(&self.running) else {
            tracing::debug!("Drain already running, skipping");
            return DrainReport::skipped(DrainSkip::AlreadyRunning);
        };

        let pending = self.store.list_pending_for(user).await;
        let mut report = DrainReport {
            attempted: pending.len(),
            ..DrainReport::default()
        };
        if !pending.is_empty() {
            tracing::info!("Draining {} queued operations", pending.len());
        }

        for op in pending {
            match self.replay(&op).await {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        "Replay of {} {}/{} failed, keeping it queued: {error}",
                        op.kind,
                        op.collection,
                        op.document_id
                    );
                    self.store
                        .record_sync_error(SyncErrorEntry::for_operation(
                            &op,
                            error.to_string(),
                            now_millis(),
                        ))
                        .await;
                }
            }
        }

        self.store.settle_sync_errors().await;
        self.store.set_last_sync_at(now_millis()).await;
        tracing::info!(
            "Drain finished: {} succeeded, {} failed",
            report.succeeded,
            report.failed
        );
        report
    }

    /// Drain on every offline → online transition until the task is aborted.
    pub fn spawn_auto_drain(&self, user: UserId) -> JoinHandle<()> {
        let drainer = self.clone();
        let mut status = self.connectivity.subscribe();
        let mut was_online = *status.borrow_and_update();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let online = *status.borrow_and_update();
                if online && !was_online {
                    tracing::info!("Connectivity restored, draining outbox");
                    drainer.drain(&user).await;
                }
                was_online = online;
            }
        })
    }

    async fn replay(&self, op: &PendingOperation) -> Result<(), RemoteError> {
        let id = self.store.resolve_alias(&op.document_id).await;
        let empty = Payload::new();
        let data = op.data.as_ref().unwrap_or(&empty);

        match op.kind {
            OperationKind::Create => {
                let remote = self.remote.create(&op.collection, data).await?;
                tracing::debug!("Replayed create {}/{} as {}", op.collection, id, remote.id);
                self.store.complete_create(op, &remote).await;
            }
            OperationKind::Update => {
                if id.is_temporary() {
                    return Err(unconfirmed_create(&op.collection, &id));
                }
                let remote = self.remote.update(&op.collection, &id, data).await?;
                self.store.remove_operation(op.id).await;
                if !self.store.has_pending(&op.collection, &id).await && !remote.data.is_empty() {
                    self.store
                        .put(CachedRecord::from_remote(&op.collection, remote))
                        .await;
                }
            }
            OperationKind::Delete => {
                if id.is_temporary() {
                    return Err(unconfirmed_create(&op.collection, &id));
                }
                match self.remote.delete(&op.collection, &id).await {
                    Ok(()) => {}
                    Err(error) if error.kind == RemoteErrorKind::NotFound => {
                        tracing::debug!("{}/{id} already gone remotely", op.collection);
                    }
                    Err(error) => return Err(error),
                }
                self.store.remove_operation(op.id).await;
            }
        }
        Ok(())
    }
}

fn unconfirmed_create(collection: &str, id: &RecordId) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::Api,
        format!("{collection}/{id} has not been created remotely yet"),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::storage::MemoryStorage;
    use crate::sync::CommandRouter;
    use crate::test_support::{payload, FakeRemote, RemoteCall};

    struct Harness {
        drainer: SyncDrainer,
        router: CommandRouter,
        store: Arc<OfflineStore>,
        remote: Arc<FakeRemote>,
        connectivity: Connectivity,
    }

    fn harness() -> Harness {
        let store = Arc::new(OfflineStore::open(
            Arc::new(MemoryStorage::new()),
            EngineConfig::default(),
        ));
        let remote = Arc::new(FakeRemote::new());
        let connectivity = Connectivity::new(false);
        Harness {
            drainer: SyncDrainer::new(store.clone(), remote.clone(), connectivity.clone()),
            router: CommandRouter::new(store.clone(), remote.clone(), connectivity.clone()),
            store,
            remote,
            connectivity,
        }
    }

    fn user() -> UserId {
        UserId::new("u1")
    }

    /// Cache and remote both hold `id` before going offline
    async fn seed(h: &Harness, id: &str) {
        h.remote.insert_at("tasks", id, payload(json!({"title": id})), 1);
        h.store
            .put(CachedRecord::new(
                "tasks",
                RecordId::new(id),
                payload(json!({"title": id})),
                1,
            ))
            .await;
    }

    #[tokio::test]
    async fn drained_create_replaces_temporary_id() {
        let h = harness();
        let created = h
            .router
            .create(Some(&user()), "tasks", payload(json!({"title": "Water Plant", "due": "2026-05-01"})))
            .await
            .unwrap();
        assert!(created.id.is_temporary());

        h.connectivity.set_online(true);
        let report = h.drainer.drain(&user()).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(h.store.pending_count().await, 0);
        let records = h.store.get_all("tasks").await;
        assert_eq!(records.len(), 1);
        let (id, record) = records.into_iter().next().unwrap();
        assert_eq!(id, RecordId::new("srv-1"));
        assert_eq!(record.data["title"], json!("Water Plant"));
        assert_eq!(h.store.resolve_alias(&created.id).await, id);
    }

    #[tokio::test]
    async fn updates_are_replayed_in_issue_order() {
        let h = harness();
        seed(&h, "x").await;
        let id = RecordId::new("x");
        h.router
            .update(Some(&user()), "tasks", &id, payload(json!({"title": "A"})))
            .await
            .unwrap();
        h.router
            .update(Some(&user()), "tasks", &id, payload(json!({"title": "B"})))
            .await
            .unwrap();

        h.connectivity.set_online(true);
        h.drainer.drain(&user()).await;

        let updates: Vec<_> = h
            .remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Update { changes, .. } => Some(changes["title"].clone()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![json!("A"), json!("B")]);
        assert_eq!(h.remote.record("tasks", &id).unwrap().data["title"], json!("B"));
    }

    #[tokio::test]
    async fn failed_operation_stays_queued_and_the_pass_continues() {
        let h = harness();
        for id in ["a", "b", "c"] {
            seed(&h, id).await;
            h.router
                .update(Some(&user()), "tasks", &RecordId::new(id), payload(json!({"done": true})))
                .await
                .unwrap();
        }
        let queued = h.store.list_pending().await;
        h.remote.fail_nth("update", 2);

        h.connectivity.set_online(true);
        let report = h.drainer.drain(&user()).await;

        assert_eq!((report.attempted, report.succeeded, report.failed), (3, 2, 1));
        let remaining = h.store.list_pending().await;
        assert_eq!(remaining, vec![queued[1].clone()]);

        let errors = h.store.sync_errors().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].operation_id, queued[1].id);
        assert!(h.store.last_sync_at().await.is_some());
    }

    #[tokio::test]
    async fn offline_sequence_converges_after_drain() {
        let h = harness();
        let created = h
            .router
            .create(Some(&user()), "tasks", payload(json!({"title": "A"})))
            .await
            .unwrap();
        h.router
            .update(Some(&user()), "tasks", &created.id, payload(json!({"title": "B"})))
            .await
            .unwrap();
        let kept = h
            .router
            .create(Some(&user()), "tasks", payload(json!({"title": "C"})))
            .await
            .unwrap();
        h.router
            .delete(Some(&user()), "tasks", &created.id)
            .await
            .unwrap();

        h.connectivity.set_online(true);
        let report = h.drainer.drain(&user()).await;

        assert_eq!(report.failed, 0);
        assert_eq!(h.store.pending_count().await, 0);
        assert_eq!(h.remote.record_count("tasks"), 1);
        let cached = h.store.get_all("tasks").await;
        assert_eq!(cached.len(), 1);
        let canonical = h.store.resolve_alias(&kept.id).await;
        assert_eq!(cached[&canonical].data["title"], json!("C"));
        assert_eq!(
            h.remote.record("tasks", &canonical).unwrap().data["title"],
            json!("C")
        );
    }

    #[tokio::test]
    async fn follow_ups_wait_for_a_failed_create() {
        let h = harness();
        let created = h
            .router
            .create(Some(&user()), "tasks", payload(json!({"title": "A"})))
            .await
            .unwrap();
        h.router
            .update(Some(&user()), "tasks", &created.id, payload(json!({"title": "B"})))
            .await
            .unwrap();
        h.remote.fail_next("create");

        h.connectivity.set_online(true);
        let report = h.drainer.drain(&user()).await;

        assert_eq!(report.failed, 2);
        assert_eq!(h.store.pending_count().await, 2);
        assert_eq!(h.remote.calls().len(), 1);

        let report = h.drainer.drain(&user()).await;
        assert_eq!(report.succeeded, 2);
        assert_eq!(h.store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn drain_replays_only_the_callers_operations() {
        let h = harness();
        h.router
            .create(Some(&user()), "tasks", payload(json!({"title": "mine"})))
            .await
            .unwrap();
        h.router
            .create(Some(&UserId::new("u2")), "tasks", payload(json!({"title": "theirs"})))
            .await
            .unwrap();

        h.connectivity.set_online(true);
        let report = h.drainer.drain(&user()).await;

        assert_eq!(report.attempted, 1);
        let left = h.store.list_pending().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].user_id, UserId::new("u2"));
    }

    #[tokio::test]
    async fn drain_is_skipped_offline_or_when_already_running() {
        let h = harness();
        assert_eq!(h.drainer.drain(&user()).await.skipped, Some(DrainSkip::Offline));
        assert!(h.store.last_sync_at().await.is_none());

        h.connectivity.set_online(true);
        let _guard = DrainGuard::acquire(&h.drainer.running).unwrap();
        assert_eq!(
            h.drainer.drain(&user()).await.skipped,
            Some(DrainSkip::AlreadyRunning)
        );
    }

    #[tokio::test]
    async fn replayed_delete_of_missing_record_succeeds() {
        let h = harness();
        h.store
            .put(CachedRecord::new("tasks", RecordId::new("gone"), Payload::new(), 1))
            .await;
        h.router
            .delete(Some(&user()), "tasks", &RecordId::new("gone"))
            .await
            .unwrap();
        h.remote.fail_next("delete");
        h.connectivity.set_online(true);
        assert_eq!(h.drainer.drain(&user()).await.failed, 1);

        assert_eq!(h.drainer.drain(&user()).await.succeeded, 1);
        assert_eq!(h.store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn update_of_remotely_removed_record_stays_queued() {
        let h = harness();
        seed(&h, "t1").await;
        let id = RecordId::new("t1");
        h.router
            .update(Some(&user()), "tasks", &id, payload(json!({"done": true})))
            .await
            .unwrap();
        h.remote.delete("tasks", &id).await.unwrap();
        h.store.remove("tasks", &id).await;

        h.connectivity.set_online(true);
        for _ in 0..3 {
            assert_eq!(h.drainer.drain(&user()).await.failed, 1);
        }

        assert_eq!(h.store.pending_count().await, 1);
        let errors = h.store.sync_errors().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].document_id, id);
    }

    #[tokio::test]
    async fn reconnect_triggers_auto_drain() {
        let h = harness();
        h.router
            .create(Some(&user()), "tasks", payload(json!({"title": "A"})))
            .await
            .unwrap();
        let task = h.drainer.spawn_auto_drain(user());

        h.connectivity.set_online(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.store.pending_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        task.abort();
        assert_eq!(h.remote.record_count("tasks"), 1);
    }
}
