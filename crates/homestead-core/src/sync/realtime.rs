//! Push-channel listener that keeps the offline cache current and forwards
//! typed record events to subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::models::{
    now_millis, CachedRecord, ChangeEntry, ChangeType, RecordEvent, RecordId, TimeRange, UserId,
};
use crate::offline::OfflineStore;
use crate::sync::ConflictResolver;

/// Capacity of the per-subscription event queue
const EVENT_BUFFER: usize = 32;

/// Failure of the push channel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Subscription denied: {0}")]
    Denied(String),
    #[error("Push channel closed")]
    Closed,
    #[error("Push channel failed: {0}")]
    Failed(String),
}

/// One notification from the push channel
pub type FeedMessage = Result<Vec<ChangeEntry>, FeedError>;

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub owner: UserId,
    pub range: Option<TimeRange>,
}

impl SubscriptionFilter {
    pub const fn owner(owner: UserId) -> Self {
        Self { owner, range: None }
    }

    #[must_use]
    pub const fn within(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Source of ordered change batches.
///
/// Delivery is at-least-once: a batch may repeat values already seen.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn open(
        &self,
        collection: &str,
        filter: &SubscriptionFilter,
    ) -> Result<mpsc::Receiver<FeedMessage>, FeedError>;
}

/// Lifecycle of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Inactive,
    Active,
    /// The channel failed; not retried automatically
    Errored(String),
}

/// Handle to a running subscription.
///
/// Dropping the handle cancels the subscription like [`Self::unsubscribe`].
pub struct Subscription {
    collection: String,
    events: mpsc::Receiver<Vec<RecordEvent>>,
    state: watch::Receiver<SubscriptionState>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next batch of events, in delivery order; `None` once the
    /// subscription stopped and every delivered batch was consumed.
    pub async fn next_batch(&mut self) -> Option<Vec<RecordEvent>> {
        self.events.recv().await
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// Stop delivery. Cache writes already applied stay in place.
    pub async fn unsubscribe(mut self) {
        self.events.close();
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("Listener task for {} ended abnormally: {error}", self.collection);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// Applies push-channel batches to the offline store.
#[derive(Clone)]
pub struct RealtimeListener {
    store: Arc<OfflineStore>,
    resolver: ConflictResolver,
}

impl RealtimeListener {
    pub fn new(store: Arc<OfflineStore>) -> Self {
        let resolver = ConflictResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Open a subscription on `feed` and start applying its batches.
    pub async fn subscribe(
        &self,
        feed: &dyn ChangeFeed,
        collection: &str,
        filter: SubscriptionFilter,
    ) -> Result<Subscription, FeedError> {
        let incoming = feed.open(collection, &filter).await?;
        tracing::info!("Subscribed to {collection} changes for {}", filter.owner);
        Ok(self.attach(collection, incoming))
    }

    /// Drive an already opened channel in a background task.
    pub fn attach(&self, collection: &str, mut incoming: mpsc::Receiver<FeedMessage>) -> Subscription {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Active);
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        let listener = self.clone();
        let owned_collection = collection.to_string();
        let task = tokio::spawn(async move {
            let collection = owned_collection;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => {
                        state_tx.send_replace(SubscriptionState::Inactive);
                        tracing::debug!("Unsubscribed from {collection}");
                        break;
                    }
                    message = incoming.recv() => match message {
                        Some(Ok(entries)) => {
                            let events = listener.apply_batch(&collection, entries).await;
                            if events.is_empty() {
                                continue;
                            }
                            if events_tx.send(events).await.is_err() {
                                state_tx.send_replace(SubscriptionState::Inactive);
                                break;
                            }
                        }
                        Some(Err(error)) => {
                            tracing::warn!("Push channel for {collection} failed: {error}");
                            state_tx.send_replace(SubscriptionState::Errored(error.to_string()));
                            break;
                        }
                        None => {
                            tracing::warn!("Push channel for {collection} closed");
                            state_tx.send_replace(SubscriptionState::Errored(FeedError::Closed.to_string()));
                            break;
                        }
                    }
                }
            }
        });

        Subscription {
            collection: collection.to_string(),
            events: events_rx,
            state: state_rx,
            cancel: Some(cancel_tx),
            task: Some(task),
        }
    }

    /// Write one batch into the store and translate it into events, in
    /// batch order. Entries for records deleted locally but not yet synced
    /// produce no event.
    pub async fn apply_batch(&self, collection: &str, entries: Vec<ChangeEntry>) -> Vec<RecordEvent> {
        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.store.resolve_alias(&entry.id).await;
            match entry.change {
                ChangeType::Added => {
                    let incoming = incoming_record(collection, id, entry);
                    if let Some(record) = self.resolver.apply_incoming(incoming).await {
                        events.push(RecordEvent::Added { record });
                    }
                }
                ChangeType::Modified => {
                    let old_record = self.store.get(collection, &id).await;
                    let incoming = incoming_record(collection, id, entry);
                    if let Some(record) = self.resolver.apply_incoming(incoming).await {
                        events.push(RecordEvent::Modified { record, old_record });
                    }
                }
                ChangeType::Removed => {
                    if let Some(record) = self.store.remove(collection, &id).await {
                        events.push(RecordEvent::Removed { record });
                    }
                }
            }
        }
        events
    }
}

/// Pushed values without a timestamp count as written now.
fn incoming_record(collection: &str, id: RecordId, entry: ChangeEntry) -> CachedRecord {
    let updated_at = entry.updated_at.unwrap_or_else(now_millis);
    CachedRecord::new(collection, id, entry.data, updated_at)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{NewOperation, Payload};
    use crate::storage::MemoryStorage;
    use crate::test_support::{change, payload, FakeFeed};

    fn listener() -> (RealtimeListener, Arc<OfflineStore>) {
        let store = Arc::new(OfflineStore::open(
            Arc::new(MemoryStorage::new()),
            EngineConfig::default(),
        ));
        (RealtimeListener::new(store.clone()), store)
    }

    fn filter() -> SubscriptionFilter {
        SubscriptionFilter::owner(UserId::new("u1"))
    }

    #[tokio::test]
    async fn modified_for_uncached_record_is_stored_without_old_value() {
        let (listener, store) = listener();

        let events = listener
            .apply_batch(
                "plants",
                vec![change(ChangeType::Modified, "p1", json!({"name": "Fern"}), Some(5))],
            )
            .await;

        assert_eq!(events.len(), 1);
        let RecordEvent::Modified { record, old_record } = &events[0] else {
            panic!("expected a modified event, got {:?}", events[0]);
        };
        assert_eq!(old_record, &None);
        assert_eq!(record.data["name"], json!("Fern"));
        assert_eq!(store.get("plants", &RecordId::new("p1")).await.as_ref(), Some(record));
    }

    #[tokio::test]
    async fn modified_captures_previous_value() {
        let (listener, store) = listener();
        let previous = CachedRecord::new("plants", RecordId::new("p1"), payload(json!({"name": "Old"})), 1);
        store.put(previous.clone()).await;

        let events = listener
            .apply_batch(
                "plants",
                vec![change(ChangeType::Modified, "p1", json!({"name": "New"}), Some(2))],
            )
            .await;

        assert_eq!(
            events,
            vec![RecordEvent::Modified {
                record: CachedRecord::new("plants", RecordId::new("p1"), payload(json!({"name": "New"})), 2),
                old_record: Some(previous),
            }]
        );
    }

    #[tokio::test]
    async fn changes_to_locally_deleted_records_emit_nothing() {
        let (listener, store) = listener();
        store
            .put(CachedRecord::new("plants", RecordId::new("p1"), payload(json!({"name": "Old"})), 1))
            .await;
        store
            .delete_local("plants", &RecordId::new("p1"), &UserId::new("u1"))
            .await
            .unwrap();

        let events = listener
            .apply_batch(
                "plants",
                vec![
                    change(ChangeType::Modified, "p1", json!({"name": "Remote"}), Some(9)),
                    change(ChangeType::Added, "p1", json!({"name": "Remote"}), Some(9)),
                    change(ChangeType::Added, "p2", json!({"name": "Ivy"}), Some(9)),
                ],
            )
            .await;

        assert_eq!(
            events,
            vec![RecordEvent::Added {
                record: CachedRecord::new("plants", RecordId::new("p2"), payload(json!({"name": "Ivy"})), 9),
            }]
        );
        assert_eq!(store.get("plants", &RecordId::new("p1")).await, None);
        assert!(store.has_pending("plants", &RecordId::new("p1")).await);
    }

    #[tokio::test]
    async fn removed_emits_only_for_cached_records() {
        let (listener, store) = listener();
        let cached = CachedRecord::new("tasks", RecordId::new("t1"), Payload::new(), 1);
        store.put(cached.clone()).await;

        let events = listener
            .apply_batch(
                "tasks",
                vec![
                    change(ChangeType::Removed, "t1", json!({}), None),
                    change(ChangeType::Removed, "ghost", json!({}), None),
                ],
            )
            .await;

        assert_eq!(events, vec![RecordEvent::Removed { record: cached }]);
        assert!(store.get("tasks", &RecordId::new("t1")).await.is_none());
    }

    #[tokio::test]
    async fn batch_order_is_preserved() {
        let (listener, _store) = listener();

        let events = listener
            .apply_batch(
                "tasks",
                vec![
                    change(ChangeType::Added, "a", json!({}), Some(1)),
                    change(ChangeType::Modified, "a", json!({"done": true}), Some(2)),
                    change(ChangeType::Removed, "a", json!({}), None),
                ],
            )
            .await;

        let kinds: Vec<_> = events.iter().map(RecordEvent::change_type).collect();
        assert_eq!(
            kinds,
            vec![ChangeType::Added, ChangeType::Modified, ChangeType::Removed]
        );
    }

    #[tokio::test]
    async fn pushed_value_does_not_overwrite_newer_unsynced_edit() {
        let (listener, store) = listener();
        store
            .put(CachedRecord::new("tasks", RecordId::new("t1"), payload(json!({"title": "mine"})), 100))
            .await;
        store
            .enqueue(NewOperation::update(
                "tasks",
                RecordId::new("t1"),
                payload(json!({"title": "mine"})),
                &UserId::new("u1"),
            ))
            .await;

        let events = listener
            .apply_batch(
                "tasks",
                vec![change(ChangeType::Modified, "t1", json!({"title": "theirs"}), Some(50))],
            )
            .await;

        assert_eq!(events[0].record().data["title"], json!("mine"));
        assert_eq!(store.conflicts(10).await.len(), 1);
    }

    #[tokio::test]
    async fn subscription_delivers_batches_as_one_array() {
        let (listener, _store) = listener();
        let feed = FakeFeed::new();
        let mut subscription = listener.subscribe(&feed, "tasks", filter()).await.unwrap();
        assert_eq!(subscription.state(), SubscriptionState::Active);
        assert_eq!(feed.filters(), vec![filter()]);

        feed.push(vec![
            change(ChangeType::Added, "a", json!({}), Some(1)),
            change(ChangeType::Added, "b", json!({}), Some(1)),
        ]);

        let batch = subscription.next_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
        subscription.unsubscribe().await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_but_keeps_writes() {
        let (listener, store) = listener();
        let feed = FakeFeed::new();
        let mut subscription = listener.subscribe(&feed, "tasks", filter()).await.unwrap();

        feed.push(vec![change(ChangeType::Added, "a", json!({}), Some(1))]);
        subscription.next_batch().await.unwrap();
        subscription.unsubscribe().await;

        feed.push(vec![change(ChangeType::Added, "b", json!({}), Some(1))]);
        tokio::task::yield_now().await;

        assert!(store.get("tasks", &RecordId::new("a")).await.is_some());
        assert!(store.get("tasks", &RecordId::new("b")).await.is_none());
    }

    #[tokio::test]
    async fn channel_failure_moves_to_errored() {
        let (listener, _store) = listener();
        let feed = FakeFeed::new();
        let mut subscription = listener.subscribe(&feed, "tasks", filter()).await.unwrap();

        feed.fail("socket reset");

        assert!(subscription.next_batch().await.is_none());
        assert_eq!(
            subscription.state(),
            SubscriptionState::Errored("Push channel failed: socket reset".to_string())
        );
    }

    #[tokio::test]
    async fn closed_channel_is_a_failure() {
        let (listener, _store) = listener();
        let feed = FakeFeed::new();
        let mut subscription = listener.subscribe(&feed, "tasks", filter()).await.unwrap();

        feed.close();

        assert!(subscription.next_batch().await.is_none());
        assert!(matches!(subscription.state(), SubscriptionState::Errored(_)));
    }

    #[tokio::test]
    async fn rejected_subscription_reports_error() {
        let (listener, _store) = listener();
        let feed = FakeFeed::new();
        feed.reject_subscriptions(FeedError::Denied("not a member".to_string()));

        let error = listener
            .subscribe(&feed, "tasks", filter())
            .await
            .err()
            .unwrap();
        assert_eq!(error, FeedError::Denied("not a member".to_string()));
    }
}
