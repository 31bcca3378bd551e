//! Delivery queue port per §4.I.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formbridge_domain::{DeliveryId, DeliveryRecord, SubmissionId};

#[derive(Debug, Clone, Default)]
pub struct DeliveryQueueStats {
    pub pending: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryQueueError {
    #[error("delivery {0} not found")]
    NotFound(String),
    #[error("connection error: {message}")]
    ConnectionError { message: String },
}

/// A boxed mutation applied to a stored [`DeliveryRecord`] by `update`.
pub type DeliveryUpdate = Box<dyn FnOnce(&mut DeliveryRecord) + Send>;

#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Enqueue a new pending delivery. Must return immediately — actual
    /// HTTP delivery is the webhook engine's job, not the queue's.
    async fn enqueue(&self, record: DeliveryRecord) -> Result<DeliveryId, DeliveryQueueError>;

    async fn get(&self, id: &DeliveryId) -> Result<Option<DeliveryRecord>, DeliveryQueueError>;

    async fn get_by_submission(&self, submission_id: &SubmissionId) -> Result<Vec<DeliveryRecord>, DeliveryQueueError>;

    /// Apply `updater` to the stored record for `id`.
    async fn update(&self, id: &DeliveryId, updater: DeliveryUpdate) -> Result<(), DeliveryQueueError>;

    /// Deliveries whose `nextRetryAt` has passed — scanned by the
    /// background retry scheduler, including after a process restart.
    async fn get_pending_retries(&self, now: DateTime<Utc>) -> Result<Vec<DeliveryRecord>, DeliveryQueueError>;

    async fn stats(&self) -> Result<DeliveryQueueStats, DeliveryQueueError>;
}
