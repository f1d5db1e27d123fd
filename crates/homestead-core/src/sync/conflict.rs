//! Last-write-wins conflict resolution.

use std::sync::Arc;

use crate::models::{now_millis, CachedRecord, ConflictDecision, ConflictSide, SyncConflict};
use crate::offline::OfflineStore;

/// Strategy name recorded in the conflict history
pub const LWW_STRATEGY: &str = "lww";

/// Pick the surviving side of a local/remote pair.
///
/// Strictly newer wins; equal timestamps go to the remote copy, which is
/// then not reported as a conflict.
pub const fn decide(local_updated_at: i64, remote_updated_at: i64) -> (ConflictSide, bool) {
    if local_updated_at > remote_updated_at {
        (ConflictSide::Local, true)
    } else {
        (ConflictSide::Remote, remote_updated_at != local_updated_at)
    }
}

/// Resolves local/remote pairs and writes winners into the offline store.
#[derive(Clone)]
pub struct ConflictResolver {
    store: Arc<OfflineStore>,
}

impl ConflictResolver {
    pub const fn new(store: Arc<OfflineStore>) -> Self {
        Self { store }
    }

    /// Resolve one pair for the same (collection, id) and store the winner.
    pub async fn resolve(&self, local: CachedRecord, remote: CachedRecord) -> ConflictDecision {
        let (winner, had_conflict) = decide(local.updated_at, remote.updated_at);

        if had_conflict {
            tracing::debug!(
                "Conflict on {}/{}: local={} remote={} -> {:?}",
                local.collection,
                local.id,
                local.updated_at,
                remote.updated_at,
                winner
            );
            self.store
                .record_conflict(SyncConflict {
                    collection: local.collection.clone(),
                    record_id: local.id.clone(),
                    local_updated_at: local.updated_at,
                    remote_updated_at: remote.updated_at,
                    winner,
                    resolved_at: now_millis(),
                    strategy: LWW_STRATEGY.to_string(),
                })
                .await;
        }

        let record = match winner {
            ConflictSide::Local => local,
            ConflictSide::Remote => remote,
        };
        self.store.put(record.clone()).await;

        ConflictDecision {
            record,
            winner,
            had_conflict,
        }
    }

    /// Install a copy that arrived from the remote store or push channel.
    ///
    /// Records with unsynced local changes go through [`Self::resolve`].
    /// Records whose local deletion is still queued stay deleted and yield
    /// `None`; the queued delete settles them at the next drain.
    pub async fn apply_incoming(&self, incoming: CachedRecord) -> Option<CachedRecord> {
        if !self.store.has_pending(&incoming.collection, &incoming.id).await {
            self.store.put(incoming.clone()).await;
            return Some(incoming);
        }
        let local = self.store.get(&incoming.collection, &incoming.id).await?;
        Some(self.resolve(local, incoming).await.record)
    }

    /// Resolve each pair independently; there is no cross-record atomicity.
    pub async fn resolve_batch(
        &self,
        pairs: Vec<(CachedRecord, CachedRecord)>,
    ) -> Vec<ConflictDecision> {
        let mut decisions = Vec::with_capacity(pairs.len());
        for (local, remote) in pairs {
            decisions.push(self.resolve(local, remote).await);
        }
        decisions
    }
}
