//! In-memory collaborators for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::models::{now_millis, ChangeEntry, ChangeType, Payload, RecordId, RemoteRecord, TimeRange};
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::sync::{ChangeFeed, FeedError, FeedMessage, SubscriptionFilter};
use crate::util::timestamp_millis;

pub(crate) fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

/// A call received by [`FakeRemote`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RemoteCall {
    Create {
        collection: String,
        payload: Payload,
    },
    Update {
        collection: String,
        id: RecordId,
        changes: Payload,
    },
    Delete {
        collection: String,
        id: RecordId,
    },
    Get {
        collection: String,
        id: RecordId,
    },
    QueryRange {
        collection: String,
        range: TimeRange,
    },
}

impl RemoteCall {
    const fn method(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Get { .. } => "get",
            Self::QueryRange { .. } => "query_range",
        }
    }
}

#[derive(Default)]
struct FakeRemoteState {
    records: BTreeMap<(String, RecordId), RemoteRecord>,
    calls: Vec<RemoteCall>,
    /// (method, calls of that method left before it fails)
    failures: Vec<(String, usize)>,
    next_id: u64,
}

/// Remote store keeping records in memory and logging every call.
#[derive(Default)]
pub(crate) struct FakeRemote {
    state: Mutex<FakeRemoteState>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn range_queries(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RemoteCall::QueryRange { .. }))
            .count()
    }

    /// Reject the next call of `method`.
    pub(crate) fn fail_next(&self, method: &str) {
        self.fail_nth(method, 1);
    }

    /// Reject the `n`-th upcoming call of `method` (1-based).
    pub(crate) fn fail_nth(&self, method: &str, n: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method.to_string(), n));
    }

    pub(crate) fn insert(&self, collection: &str, id: &str, data: Payload) {
        self.insert_at(collection, id, data, now_millis());
    }

    pub(crate) fn insert_at(&self, collection: &str, id: &str, data: Payload, updated_at: i64) {
        let record = RemoteRecord {
            id: RecordId::new(id),
            data,
            updated_at: Some(updated_at),
        };
        self.state
            .lock()
            .unwrap()
            .records
            .insert((collection.to_string(), RecordId::new(id)), record);
    }

    pub(crate) fn record(&self, collection: &str, id: &RecordId) -> Option<RemoteRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(collection.to_string(), id.clone()))
            .cloned()
    }

    pub(crate) fn record_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .keys()
            .filter(|(stored, _)| stored == collection)
            .count()
    }

    /// Log the call and apply any scheduled failure for it.
    fn begin(&self, call: RemoteCall) -> RemoteResult<std::sync::MutexGuard<'_, FakeRemoteState>> {
        let mut state = self.state.lock().unwrap();
        let method = call.method();
        state.calls.push(call);

        let mut failed = false;
        state.failures.retain_mut(|(failing, remaining)| {
            if failing != method {
                return true;
            }
            *remaining -= 1;
            if *remaining == 0 {
                failed = true;
                return false;
            }
            true
        });
        if failed {
            return Err(RemoteError::network(format!("{method} rejected by test")));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn create(&self, collection: &str, payload: &Payload) -> RemoteResult<RemoteRecord> {
        let mut state = self.begin(RemoteCall::Create {
            collection: collection.to_string(),
            payload: payload.clone(),
        })?;
        state.next_id += 1;
        let record = RemoteRecord {
            id: RecordId::new(format!("srv-{}", state.next_id)),
            data: payload.clone(),
            updated_at: Some(now_millis()),
        };
        state
            .records
            .insert((collection.to_string(), record.id.clone()), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        changes: &Payload,
    ) -> RemoteResult<RemoteRecord> {
        let mut state = self.begin(RemoteCall::Update {
            collection: collection.to_string(),
            id: id.clone(),
            changes: changes.clone(),
        })?;
        let record = state
            .records
            .get_mut(&(collection.to_string(), id.clone()))
            .ok_or_else(|| RemoteError::not_found(format!("{collection}/{id}")))?;
        for (key, value) in changes {
            record.data.insert(key.clone(), value.clone());
        }
        record.updated_at = Some(now_millis());
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()> {
        let mut state = self.begin(RemoteCall::Delete {
            collection: collection.to_string(),
            id: id.clone(),
        })?;
        state
            .records
            .remove(&(collection.to_string(), id.clone()))
            .map(|_| ())
            .ok_or_else(|| RemoteError::not_found(format!("{collection}/{id}")))
    }

    async fn get(&self, collection: &str, id: &RecordId) -> RemoteResult<Option<RemoteRecord>> {
        let state = self.begin(RemoteCall::Get {
            collection: collection.to_string(),
            id: id.clone(),
        })?;
        Ok(state.records.get(&(collection.to_string(), id.clone())).cloned())
    }

    async fn query_range(
        &self,
        collection: &str,
        range: TimeRange,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let state = self.begin(RemoteCall::QueryRange {
            collection: collection.to_string(),
            range,
        })?;
        let config = EngineConfig::default();
        let field = config.range_field(collection);
        Ok(state
            .records
            .iter()
            .filter(|((stored, _), record)| {
                stored == collection
                    && record
                        .data
                        .get(field)
                        .and_then(timestamp_millis)
                        .is_some_and(|time| range.contains(time))
            })
            .map(|(_, record)| record.clone())
            .collect())
    }
}

/// Push channel driven by the test through [`FakeFeed::push`].
#[derive(Default)]
pub(crate) struct FakeFeed {
    sender: Mutex<Option<mpsc::Sender<FeedMessage>>>,
    filters: Mutex<Vec<SubscriptionFilter>>,
    reject: Mutex<Option<FeedError>>,
}

impl FakeFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reject_subscriptions(&self, error: FeedError) {
        *self.reject.lock().unwrap() = Some(error);
    }

    pub(crate) fn filters(&self) -> Vec<SubscriptionFilter> {
        self.filters.lock().unwrap().clone()
    }

    pub(crate) fn push(&self, batch: Vec<ChangeEntry>) {
        self.send(Ok(batch));
    }

    pub(crate) fn fail(&self, message: &str) {
        self.send(Err(FeedError::Failed(message.to_string())));
    }

    /// Drop the sending side, as a dropped connection would.
    pub(crate) fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    fn send(&self, message: FeedMessage) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(message);
        }
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn open(
        &self,
        _collection: &str,
        filter: &SubscriptionFilter,
    ) -> Result<mpsc::Receiver<FeedMessage>, FeedError> {
        if let Some(error) = self.reject.lock().unwrap().take() {
            return Err(error);
        }
        let (sender, receiver) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(sender);
        self.filters.lock().unwrap().push(filter.clone());
        Ok(receiver)
    }
}

/// Change entry with an explicit timestamp
pub(crate) fn change(
    change: ChangeType,
    id: &str,
    data: serde_json::Value,
    updated_at: Option<i64>,
) -> ChangeEntry {
    ChangeEntry {
        change,
        id: RecordId::new(id),
        data: payload(data),
        updated_at,
    }
}
