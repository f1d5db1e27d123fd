//! Range index over time-based collections

use std::collections::HashSet;

use super::OfflineStore;
use crate::models::{covers, insert_range, CachedRecord, RecordId, TimeRange};
use crate::util::timestamp_millis;

/// Position of a record on the timeline, read from its configured field
fn record_time(record: &CachedRecord, field: &str) -> Option<i64> {
    record.data.get(field).and_then(timestamp_millis)
}

impl OfflineStore {
    /// Whether every instant of `range` has been fetched and cached
    pub async fn is_range_cached(&self, collection: &str, range: TimeRange) -> bool {
        self.lock()
            .await
            .ranges
            .get(collection)
            .is_some_and(|ranges| covers(ranges, range))
    }

    /// Store the records fetched for `range` and mark the range as covered in
    /// one step, so coverage is never recorded without its records.
    ///
    /// The fetch is authoritative for the range: cached records inside it that
    /// were not returned are dropped, unless they carry unsynced changes.
    pub async fn store_range(&self, collection: &str, range: TimeRange, records: Vec<CachedRecord>) {
        let field = self.config.range_field(collection);
        let mut state = self.lock().await;

        let pending: HashSet<RecordId> = state
            .outbox
            .iter()
            .filter(|op| op.collection == collection)
            .map(|op| state.resolve_alias(&op.document_id))
            .collect();
        let fetched: HashSet<RecordId> = records.iter().map(|record| record.id.clone()).collect();

        let cached = state.records.entry(collection.to_string()).or_default();
        cached.retain(|id, record| {
            fetched.contains(id)
                || pending.contains(id)
                || !record_time(record, field).is_some_and(|time| range.contains(time))
        });
        for record in records {
            cached.insert(record.id.clone(), record);
        }
        insert_range(state.ranges.entry(collection.to_string()).or_default(), range);
        self.persist(&mut state);
    }

    /// Forget all coverage for a collection so the next query refetches.
    pub async fn invalidate_ranges(&self, collection: &str) {
        let mut state = self.lock().await;
        if state.ranges.remove(collection).is_some() {
            self.persist(&mut state);
            tracing::debug!("Invalidated cached ranges for {collection}");
        }
    }

    /// Cached records of `collection` whose time field falls inside `range`,
    /// ordered by time then id.
    pub async fn records_in_range(&self, collection: &str, range: TimeRange) -> Vec<CachedRecord> {
        let field = self.config.range_field(collection);
        let state = self.lock().await;
        let Some(records) = state.records.get(collection) else {
            return Vec::new();
        };

        let mut matching: Vec<(i64, CachedRecord)> = records
            .values()
            .filter_map(|record| {
                let timestamp = record_time(record, field)?;
                range
                    .contains(timestamp)
                    .then(|| (timestamp, record.clone()))
            })
            .collect();
        matching.sort_by(|(left_time, left), (right_time, right)| {
            left_time.cmp(right_time).then_with(|| left.id.cmp(&right.id))
        });
        matching.into_iter().map(|(_, record)| record).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::config::EngineConfig;
    use crate::models::{NewOperation, Payload, UserId};
    use crate::offline::OfflineStore;
    use crate::storage::MemoryStorage;

    use super::*;

    fn store() -> OfflineStore {
        OfflineStore::open(Arc::new(MemoryStorage::new()), EngineConfig::default())
    }

    fn event(id: &str, start: i64) -> CachedRecord {
        let data: Payload = json!({"title": id, "start": start})
            .as_object()
            .cloned()
            .unwrap();
        CachedRecord::new("events", RecordId::new(id), data, 1)
    }

    fn range(start: i64, end: i64) -> TimeRange {
        TimeRange::new(start, end).unwrap()
    }

    #[tokio::test]
    async fn store_range_marks_coverage() {
        let store = store();
        assert!(!store.is_range_cached("events", range(0, 100)).await);

        store
            .store_range("events", range(0, 100), vec![event("e1", 10)])
            .await;

        assert!(store.is_range_cached("events", range(0, 100)).await);
        assert!(store.is_range_cached("events", range(20, 50)).await);
        assert!(!store.is_range_cached("events", range(50, 150)).await);
        assert!(!store.is_range_cached("tasks", range(20, 50)).await);
    }

    #[tokio::test]
    async fn records_in_range_filters_and_orders_by_time() {
        let store = store();
        store
            .store_range(
                "events",
                range(0, 100),
                vec![event("late", 90), event("early", 5), event("outside", 100)],
            )
            .await;

        let ids: Vec<_> = store
            .records_in_range("events", range(0, 100))
            .await
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec![RecordId::new("early"), RecordId::new("late")]);
    }

    #[tokio::test]
    async fn store_range_drops_stale_records_but_keeps_unsynced_ones() {
        let store = store();
        store
            .store_range("events", range(0, 100), vec![event("gone", 10), event("dirty", 20)])
            .await;
        store.put(event("elsewhere", 500)).await;
        store
            .enqueue(NewOperation::update(
                "events",
                RecordId::new("dirty"),
                Payload::new(),
                &UserId::new("u1"),
            ))
            .await;

        store
            .store_range("events", range(0, 100), vec![event("fresh", 30)])
            .await;

        let all = store.get_all("events").await;
        assert!(!all.contains_key(&RecordId::new("gone")));
        assert!(all.contains_key(&RecordId::new("dirty")));
        assert!(all.contains_key(&RecordId::new("fresh")));
        assert!(all.contains_key(&RecordId::new("elsewhere")));
    }

    #[tokio::test]
    async fn invalidate_ranges_drops_coverage_only() {
        let store = store();
        store
            .store_range("events", range(0, 100), vec![event("e1", 10)])
            .await;

        store.invalidate_ranges("events").await;

        assert!(!store.is_range_cached("events", range(0, 100)).await);
        assert_eq!(store.get_all("events").await.len(), 1);
    }
}
