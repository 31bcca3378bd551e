//! HTTP handlers for FormBridge's submission, approval, upload, resume,
//! and event-stream endpoints per §6.

pub mod approvals;
pub mod error;
pub mod events;
pub mod resume;
pub mod submissions;
pub mod uploads;

pub use error::{ApiError, ApiResult};
