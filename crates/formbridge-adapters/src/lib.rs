//! FormBridge port implementations.
//!
//! Concrete backends for the seams `formbridge-ports` declares: in-memory
//! stores for the submission/event/delivery records, a durable Postgres
//! event store, a `tokio::sync::broadcast`-backed live emitter, the
//! outbound webhook engine and its retry scheduler, and the local/S3
//! upload storage backends. Nothing in `formbridge-manager` or
//! `formbridge-domain` depends on this crate — it is wired in only by a
//! binary (`formbridge-api`).

pub mod config;
pub mod event_emitter;
pub mod memory_delivery_queue;
pub mod memory_event_store;
pub mod memory_submission_store;
pub mod postgres;
pub mod storage_local;
pub mod storage_s3;
pub mod webhook_engine;

pub use config::{AdaptersConfig, StorageBackendConfig};
pub use event_emitter::BroadcastEventEmitter;
pub use memory_delivery_queue::InMemoryDeliveryQueue;
pub use memory_event_store::InMemoryEventStore;
pub use memory_submission_store::InMemorySubmissionStore;
pub use postgres::PostgresEventStore;
pub use storage_local::LocalStorageBackend;
pub use storage_s3::{S3StorageBackend, S3StorageConfig};
pub use webhook_engine::{ReqwestWebhookSender, WebhookEngine, WebhookEngineConfig, WebhookRetryScheduler};
