//! In-memory `DeliveryQueue` per §4.I.
//!
//! Indexes by `deliveryId` and by `submissionId`. `enqueue` only ever
//! stores the record — actual HTTP delivery is the webhook engine's job.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use formbridge_domain::{DeliveryId, DeliveryRecord, DeliveryStatus, SubmissionId};
use formbridge_ports::{DeliveryQueue, DeliveryQueueError, DeliveryQueueStats, DeliveryUpdate};

#[derive(Default)]
pub struct InMemoryDeliveryQueue {
    records: RwLock<HashMap<String, DeliveryRecord>>,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn enqueue(&self, record: DeliveryRecord) -> Result<DeliveryId, DeliveryQueueError> {
        let id = record.delivery_id.clone();
        self.records.write().await.insert(id.as_str().to_string(), record);
        Ok(id)
    }

    async fn get(&self, id: &DeliveryId) -> Result<Option<DeliveryRecord>, DeliveryQueueError> {
        Ok(self.records.read().await.get(id.as_str()).cloned())
    }

    async fn get_by_submission(&self, submission_id: &SubmissionId) -> Result<Vec<DeliveryRecord>, DeliveryQueueError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| &r.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: &DeliveryId, updater: DeliveryUpdate) -> Result<(), DeliveryQueueError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id.as_str())
            .ok_or_else(|| DeliveryQueueError::NotFound(id.as_str().to_string()))?;
        updater(record);
        Ok(())
    }

    async fn get_pending_retries(&self, now: DateTime<Utc>) -> Result<Vec<DeliveryRecord>, DeliveryQueueError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == DeliveryStatus::Pending && r.next_retry_at.map(|at| at <= now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<DeliveryQueueStats, DeliveryQueueError> {
        let records = self.records.read().await;
        let mut stats = DeliveryQueueStats::default();
        for record in records.values() {
            match record.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Succeeded => stats.succeeded += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeliveryRecord {
        DeliveryRecord::pending(SubmissionId::new(), "https://example.com/hook".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn enqueue_then_get_round_trips() {
        let queue = InMemoryDeliveryQueue::new();
        let record = sample();
        let id = queue.enqueue(record).await.unwrap();
        assert!(queue.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_applies_the_mutation_in_place() {
        let queue = InMemoryDeliveryQueue::new();
        let id = queue.enqueue(sample()).await.unwrap();
        queue
            .update(
                &id,
                Box::new(|record| {
                    record.status = DeliveryStatus::Succeeded;
                    record.attempts = 1;
                }),
            )
            .await
            .unwrap();
        let record = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Succeeded);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn get_pending_retries_only_returns_due_pending_records() {
        let queue = InMemoryDeliveryQueue::new();
        let now = Utc::now();
        let mut due = sample();
        due.next_retry_at = Some(now - chrono::Duration::seconds(1));
        let mut not_due = sample();
        not_due.next_retry_at = Some(now + chrono::Duration::hours(1));

        let due_id = queue.enqueue(due).await.unwrap();
        queue.enqueue(not_due).await.unwrap();

        let pending = queue.get_pending_retries(now).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].delivery_id, due_id);
    }

    #[tokio::test]
    async fn stats_tally_by_status() {
        let queue = InMemoryDeliveryQueue::new();
        let id = queue.enqueue(sample()).await.unwrap();
        queue
            .update(&id, Box::new(|r| r.status = DeliveryStatus::Succeeded))
            .await
            .unwrap();
        queue.enqueue(sample()).await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.pending, 1);
    }
}
