//! In-memory `EventStore` per §4.D.
//!
//! Enforces monotonic, gap-free `version` per submission and rejects
//! duplicate `eventId`s. `count` shares `EventFilter::matches` with `list`
//! so pagination metadata never requires a second, unfiltered read.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use formbridge_domain::{IntakeEvent, SubmissionId};
use formbridge_ports::{EventFilter, EventStore, EventStoreError};

#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Vec<IntakeEvent>>>,
    seen_ids: RwLock<std::collections::HashSet<String>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: IntakeEvent) -> Result<(), EventStoreError> {
        let mut seen = self.seen_ids.write().await;
        if !seen.insert(event.event_id.as_str().to_string()) {
            return Err(EventStoreError::DuplicateEventId {
                event_id: event.event_id.as_str().to_string(),
            });
        }
        drop(seen);

        let mut streams = self.streams.write().await;
        let stream = streams.entry(event.submission_id.as_str().to_string()).or_default();
        let expected = stream.last().map(|e| e.version + 1).unwrap_or(1);
        if event.version != expected {
            return Err(EventStoreError::VersionConflict {
                submission_id: event.submission_id.as_str().to_string(),
                expected,
                actual: event.version,
            });
        }
        stream.push(event);
        Ok(())
    }

    async fn list(
        &self,
        submission_id: &SubmissionId,
        filter: &EventFilter,
    ) -> Result<Vec<IntakeEvent>, EventStoreError> {
        let streams = self.streams.read().await;
        let Some(stream) = streams.get(submission_id.as_str()) else {
            return Ok(vec![]);
        };
        let matching: Vec<IntakeEvent> = stream.iter().filter(|e| filter.matches(e)).cloned().collect();
        let offset = filter.offset.unwrap_or(0);
        let page: Vec<IntakeEvent> = match filter.limit {
            Some(limit) => matching.into_iter().skip(offset).take(limit).collect(),
            None => matching.into_iter().skip(offset).collect(),
        };
        Ok(page)
    }

    async fn count(&self, submission_id: &SubmissionId, filter: &EventFilter) -> Result<usize, EventStoreError> {
        let streams = self.streams.read().await;
        let Some(stream) = streams.get(submission_id.as_str()) else {
            return Ok(0);
        };
        Ok(stream.iter().filter(|e| filter.matches(e)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_domain::{Actor, EventId, EventKind, SubmissionState};

    fn event(submission_id: &SubmissionId, version: u64) -> IntakeEvent {
        IntakeEvent::new(
            EventKind::FieldUpdated,
            submission_id.clone(),
            Actor::system("test"),
            SubmissionState::InProgress,
            serde_json::json!({}),
            version,
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn versions_must_be_gap_free_and_start_at_one() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        store.append(event(&submission_id, 1)).await.unwrap();
        store.append(event(&submission_id, 2)).await.unwrap();
        let err = store.append(event(&submission_id, 4)).await.unwrap_err();
        assert!(matches!(err, EventStoreError::VersionConflict { expected: 3, actual: 4, .. }));
    }

    #[tokio::test]
    async fn duplicate_event_id_is_rejected() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        let mut e1 = event(&submission_id, 1);
        e1.event_id = EventId::from_string("evt_fixed".to_string());
        let mut e2 = event(&submission_id, 2);
        e2.event_id = e1.event_id.clone();

        store.append(e1).await.unwrap();
        let err = store.append(e2).await.unwrap_err();
        assert!(matches!(err, EventStoreError::DuplicateEventId { .. }));
    }

    #[tokio::test]
    async fn count_matches_list_len_for_the_same_filter() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        for v in 1..=5u64 {
            store.append(event(&submission_id, v)).await.unwrap();
        }
        let filter = EventFilter::default();
        let count = store.count(&submission_id, &filter).await.unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn pagination_limit_zero_returns_empty_but_count_reflects_all() {
        let store = InMemoryEventStore::new();
        let submission_id = SubmissionId::new();
        for v in 1..=3u64 {
            store.append(event(&submission_id, v)).await.unwrap();
        }
        let mut filter = EventFilter::default();
        filter.limit = Some(0);
        let page = store.list(&submission_id, &filter).await.unwrap();
        assert!(page.is_empty());

        let unfiltered = EventFilter::default();
        assert_eq!(store.count(&submission_id, &unfiltered).await.unwrap(), 3);
    }
}
