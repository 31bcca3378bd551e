//! FormBridge orchestration layer.
//!
//! Wires the pure domain core (`formbridge-domain`) to the port traits
//! (`formbridge-ports`) a concrete adapter crate implements. Nothing in
//! this crate talks to a database, an HTTP client, or a filesystem
//! directly — every I/O boundary is an injected `Arc<dyn Trait>`.

pub mod approval_manager;
pub mod errors;
pub mod expiry_scheduler;
pub mod submission_manager;
pub mod tool_adapter;
pub mod upload_negotiator;
pub mod webhook;

pub use approval_manager::ApprovalManager;
pub use errors::{ManagerError, ManagerResult};
pub use expiry_scheduler::{ExpiryScheduler, ExpirySchedulerConfig};
pub use submission_manager::{HandoffView, SubmissionManager, SubmissionView};
pub use tool_adapter::ToolSurfaceAdapter;
pub use upload_negotiator::{UploadConstraintsView, UploadNegotiator, UploadUrlView};
