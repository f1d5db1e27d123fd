//! Engine façade shared by every client.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::connectivity::Connectivity;
use crate::models::{CachedRecord, Payload, RecordId, SyncConflict, TimeRange, UserId};
use crate::offline::OfflineStore;
use crate::remote::RemoteStore;
use crate::state::SyncStatus;
use crate::storage::{DurableStorage, MemoryStorage, SqliteStorage};
use crate::sync::{
    ChangeFeed, CommandRouter, DrainReport, RealtimeListener, Subscription, SubscriptionFilter,
    SyncDrainer,
};
use crate::Result;

/// Explicitly constructed offline engine.
///
/// Built at startup with its storage, remote store and connectivity signal;
/// call [`SyncEngine::shutdown`] before exiting so the state is flushed.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<OfflineStore>,
    connectivity: Connectivity,
    router: CommandRouter,
    drainer: SyncDrainer,
    listener: RealtimeListener,
    auto_drain: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncEngine {
    pub fn new(
        storage: Arc<dyn DurableStorage>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Connectivity,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(OfflineStore::open(storage, config));
        Self {
            router: CommandRouter::new(store.clone(), remote.clone(), connectivity.clone()),
            drainer: SyncDrainer::new(store.clone(), remote, connectivity.clone()),
            listener: RealtimeListener::new(store.clone()),
            store,
            connectivity,
            auto_drain: Arc::new(Mutex::new(None)),
        }
    }

    /// Open an engine persisting to a SQLite file at `path`.
    pub fn open_path(
        path: impl AsRef<Path>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Connectivity,
        config: EngineConfig,
    ) -> Result<Self> {
        let storage = SqliteStorage::open(path.as_ref())?;
        Ok(Self::new(Arc::new(storage), remote, connectivity, config))
    }

    /// Open an engine whose state lives only in memory (primarily for tests).
    pub fn open_in_memory(remote: Arc<dyn RemoteStore>, connectivity: Connectivity) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            remote,
            connectivity,
            EngineConfig::default(),
        )
    }

    pub fn store(&self) -> &Arc<OfflineStore> {
        &self.store
    }

    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub const fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub async fn create(
        &self,
        user: Option<&UserId>,
        collection: &str,
        data: Payload,
    ) -> Result<CachedRecord> {
        self.router.create(user, collection, data).await
    }

    pub async fn update(
        &self,
        user: Option<&UserId>,
        collection: &str,
        id: &RecordId,
        changes: Payload,
    ) -> Result<CachedRecord> {
        self.router.update(user, collection, id, changes).await
    }

    pub async fn delete(&self, user: Option<&UserId>, collection: &str, id: &RecordId) -> Result<()> {
        self.router.delete(user, collection, id).await
    }

    pub async fn get(&self, collection: &str, id: &RecordId) -> Option<CachedRecord> {
        self.router.get(collection, id).await
    }

    pub async fn list(&self, collection: &str) -> Vec<CachedRecord> {
        self.router.list(collection).await
    }

    pub async fn query_range(&self, collection: &str, range: TimeRange) -> Vec<CachedRecord> {
        self.router.query_range(collection, range).await
    }

    /// Drop range coverage for `collection`; the next range query refetches.
    pub async fn invalidate_ranges(&self, collection: &str) {
        self.store.invalidate_ranges(collection).await;
    }

    /// Drain the outbox for `user` now.
    pub async fn sync(&self, user: &UserId) -> DrainReport {
        self.drainer.drain(user).await
    }

    /// Start draining automatically on reconnect for `user`, when enabled in
    /// the configuration. Replaces any previously started watcher.
    pub fn start(&self, user: UserId) {
        if !self.store.config().auto_drain {
            tracing::debug!("Auto-drain disabled by configuration");
            return;
        }
        let handle = self.drainer.spawn_auto_drain(user);
        let previous = self
            .auto_drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Subscribe to pushed changes of `collection`.
    pub async fn subscribe(
        &self,
        feed: &dyn ChangeFeed,
        collection: &str,
        filter: SubscriptionFilter,
    ) -> Result<Subscription> {
        Ok(self.listener.subscribe(feed, collection, filter).await?)
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus::derive(
            self.connectivity.is_online(),
            self.drainer.is_running(),
            self.store.pending_count().await,
            self.store.last_sync_at().await,
            &self.store.sync_errors().await,
        )
    }

    /// Recently resolved conflicts, newest first
    pub async fn conflicts(&self, limit: usize) -> Vec<SyncConflict> {
        self.store.conflicts(limit).await
    }

    /// Wipe every cached record, queued operation and history entry.
    pub async fn clear_offline_data(&self) {
        self.store.clear_offline_data().await;
    }

    /// Stop background work and flush the state to durable storage.
    pub async fn shutdown(&self) {
        let handle = self
            .auto_drain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.store.flush().await;
        tracing::debug!("Sync engine shut down");
    }
}
