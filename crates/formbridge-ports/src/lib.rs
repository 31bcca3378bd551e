//! FormBridge port traits.
//!
//! Every trait here is the seam between the orchestration logic in
//! `formbridge-manager` and a concrete backend in `formbridge-adapters`.
//! Implementations are stored behind `Arc<dyn Trait>` in the manager/API
//! layer, so every method is `async_trait`-based rather than returning a
//! native `impl Future` (which is not object-safe).

pub mod clock;
pub mod delivery_queue;
pub mod event_emitter;
pub mod event_store;
pub mod storage_backend;
pub mod submission_store;
pub mod webhook_sender;

pub use clock::{Clock, SystemClock};
pub use delivery_queue::{DeliveryQueue, DeliveryQueueError, DeliveryQueueStats, DeliveryUpdate};
pub use event_emitter::EventEmitter;
pub use event_store::{EventFilter, EventStore, EventStoreError};
pub use storage_backend::{
    StorageBackend, StorageBackendError, UploadConstraints, UploadUrlRequest, UploadUrlResponse,
    UploadedFileInfo, VerifyStatus, VerifyUploadResult,
};
pub use submission_store::{SubmissionStore, SubmissionStoreError, SubmissionStoreStats};
pub use webhook_sender::{WebhookRequest, WebhookResponse, WebhookSendError, WebhookSender};
