//! Online-aware command router used by the UI layer.
//!
//! Mutations try the remote store first when connected and fall back to the
//! local path (cache write + outbox entry) when offline or when the remote
//! call rejects. Only `NotAuthenticated` and `NotFoundInCache` reach callers.

use std::sync::Arc;

use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::models::{CachedRecord, Payload, RecordId, RemoteRecord, TimeRange, UserId};
use crate::offline::OfflineStore;
use crate::remote::RemoteStore;
use crate::sync::ConflictResolver;

/// Façade deciding per call between the remote and the local path.
#[derive(Clone)]
pub struct CommandRouter {
    store: Arc<OfflineStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Connectivity,
    resolver: ConflictResolver,
}

impl CommandRouter {
    pub fn new(
        store: Arc<OfflineStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Connectivity,
    ) -> Self {
        let resolver = ConflictResolver::new(store.clone());
        Self {
            store,
            remote,
            connectivity,
            resolver,
        }
    }

    /// Create a record; returns it under its remote id when the remote call
    /// succeeded, otherwise under a temporary id with a queued `create`.
    pub async fn create(
        &self,
        user: Option<&UserId>,
        collection: &str,
        data: Payload,
    ) -> Result<CachedRecord> {
        let user = require_user(user)?;

        if self.connectivity.is_online() {
            match self.remote.create(collection, &data).await {
                Ok(remote) => {
                    let record = authoritative(collection, remote, || data.clone());
                    self.store.put(record.clone()).await;
                    return Ok(record);
                }
                Err(error) => {
                    tracing::warn!("Remote create in {collection} failed, queueing offline: {error}");
                }
            }
        }

        let record = self.store.create_local(collection, data, user).await;
        tracing::debug!("Created {collection}/{} offline", record.id);
        Ok(record)
    }

    /// Apply a partial update to a record.
    pub async fn update(
        &self,
        user: Option<&UserId>,
        collection: &str,
        id: &RecordId,
        changes: Payload,
    ) -> Result<CachedRecord> {
        let user = require_user(user)?;
        let id = self.store.resolve_alias(id).await;

        if self.should_try_remote(collection, &id).await {
            match self.remote.update(collection, &id, &changes).await {
                Ok(remote) => {
                    let cached = self.store.get(collection, &id).await;
                    let record = authoritative(collection, remote, || {
                        let mut data = cached.map(|record| record.data).unwrap_or_default();
                        for (key, value) in &changes {
                            data.insert(key.clone(), value.clone());
                        }
                        data
                    });
                    self.store.put(record.clone()).await;
                    return Ok(record);
                }
                Err(error) => {
                    tracing::warn!(
                        "Remote update of {collection}/{id} failed, queueing offline: {error}"
                    );
                }
            }
        }

        self.store.update_local(collection, &id, changes, user).await
    }

    /// Delete a record.
    pub async fn delete(&self, user: Option<&UserId>, collection: &str, id: &RecordId) -> Result<()> {
        let user = require_user(user)?;
        let id = self.store.resolve_alias(id).await;

        if self.should_try_remote(collection, &id).await {
            match self.remote.delete(collection, &id).await {
                Ok(()) => {
                    self.store.remove(collection, &id).await;
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(
                        "Remote delete of {collection}/{id} failed, queueing offline: {error}"
                    );
                }
            }
        }

        self.store.delete_local(collection, &id, user).await?;
        Ok(())
    }

    /// Read one record, refreshing it from the remote store when connected.
    ///
    /// A remote copy never silently replaces a record with unsynced local
    /// changes; the pair goes through the conflict resolver instead.
    pub async fn get(&self, collection: &str, id: &RecordId) -> Option<CachedRecord> {
        let id = self.store.resolve_alias(id).await;
        if !self.connectivity.is_online() || id.is_temporary() {
            return self.store.get(collection, &id).await;
        }

        match self.remote.get(collection, &id).await {
            Ok(Some(remote)) => {
                let incoming = CachedRecord::from_remote(collection, remote);
                self.reconcile(incoming).await
            }
            Ok(None) => {
                if self.store.has_pending(collection, &id).await {
                    self.store.get(collection, &id).await
                } else {
                    self.store.remove(collection, &id).await;
                    None
                }
            }
            Err(error) => {
                tracing::warn!("Remote get of {collection}/{id} failed, serving cache: {error}");
                self.store.get(collection, &id).await
            }
        }
    }

    /// Every cached record of a collection, ordered by id
    pub async fn list(&self, collection: &str) -> Vec<CachedRecord> {
        self.store.get_all(collection).await.into_values().collect()
    }

    /// Records of `collection` inside `range`.
    ///
    /// Served from cache when the range is fully covered; otherwise fetched
    /// when connected (and the range marked covered), falling back to the
    /// possibly partial cache on failure or when offline.
    pub async fn query_range(&self, collection: &str, range: TimeRange) -> Vec<CachedRecord> {
        if self.store.is_range_cached(collection, range).await {
            tracing::debug!(
                "Serving {collection} [{}, {}) from cache",
                range.start,
                range.end
            );
            return self.store.records_in_range(collection, range).await;
        }

        if !self.connectivity.is_online() {
            return self.store.records_in_range(collection, range).await;
        }

        match self.remote.query_range(collection, range).await {
            Ok(fetched) => {
                let mut fresh = Vec::with_capacity(fetched.len());
                for remote in fetched {
                    let incoming = CachedRecord::from_remote(collection, remote);
                    if self.store.has_pending(collection, &incoming.id).await {
                        self.reconcile(incoming).await;
                    } else {
                        fresh.push(incoming);
                    }
                }
                self.store.store_range(collection, range, fresh).await;
            }
            Err(error) => {
                tracing::warn!(
                    "Remote range query on {collection} failed, serving cache: {error}"
                );
            }
        }
        self.store.records_in_range(collection, range).await
    }

    /// Remote attempts are skipped when offline, for ids the remote store
    /// cannot know yet, and for records with queued operations (which must
    /// be replayed first to keep per-record order).
    async fn should_try_remote(&self, collection: &str, id: &RecordId) -> bool {
        self.connectivity.is_online()
            && !id.is_temporary()
            && !self.store.has_pending(collection, id).await
    }

    /// Install a remote copy, resolving against an unsynced local one.
    async fn reconcile(&self, incoming: CachedRecord) -> Option<CachedRecord> {
        self.resolver.apply_incoming(incoming).await
    }
}

fn require_user(user: Option<&UserId>) -> Result<&UserId> {
    user.ok_or(Error::NotAuthenticated)
}

/// Cache entry for a remote result; stores that echo only the id get the
/// locally known payload.
fn authoritative(
    collection: &str,
    remote: RemoteRecord,
    fallback: impl FnOnce() -> Payload,
) -> CachedRecord {
    let mut record = CachedRecord::from_remote(collection, remote);
    if record.data.is_empty() {
        record.data = fallback();
    }
    record
}
