//! The per-submission event log per §3, §4.D.
//!
//! Every write to a submission appends exactly one [`IntakeEvent`] to its
//! stream. `version` is the gap-free, monotonically increasing sequence
//! number within that stream — it is also the optimistic-concurrency token
//! callers pass back as `expectedVersion`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Actor, EventId, SubmissionId};
use crate::submission::SubmissionState;

/// The kind of a recorded event. Per §9's open question, `field.updated`
/// (singular, one event per changed field) is the canonical convention;
/// `fields.updated` (batched) is not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SubmissionCreated,
    FieldUpdated,
    ValidationPassed,
    ValidationFailed,
    UploadRequested,
    UploadCompleted,
    UploadFailed,
    SubmissionSubmitted,
    ReviewRequested,
    ReviewApproved,
    ReviewRejected,
    ReviewChangesRequested,
    DeliveryAttempted,
    DeliverySucceeded,
    DeliveryFailed,
    SubmissionFinalized,
    SubmissionCancelled,
    SubmissionExpired,
    HandoffLinkIssued,
    HandoffResumed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SubmissionCreated => "submission.created",
            EventKind::FieldUpdated => "field.updated",
            EventKind::ValidationPassed => "validation.passed",
            EventKind::ValidationFailed => "validation.failed",
            EventKind::UploadRequested => "upload.requested",
            EventKind::UploadCompleted => "upload.completed",
            EventKind::UploadFailed => "upload.failed",
            EventKind::SubmissionSubmitted => "submission.submitted",
            EventKind::ReviewRequested => "review.requested",
            EventKind::ReviewApproved => "review.approved",
            EventKind::ReviewRejected => "review.rejected",
            EventKind::ReviewChangesRequested => "review.changes_requested",
            EventKind::DeliveryAttempted => "delivery.attempted",
            EventKind::DeliverySucceeded => "delivery.succeeded",
            EventKind::DeliveryFailed => "delivery.failed",
            EventKind::SubmissionFinalized => "submission.finalized",
            EventKind::SubmissionCancelled => "submission.cancelled",
            EventKind::SubmissionExpired => "submission.expired",
            EventKind::HandoffLinkIssued => "handoff.link_issued",
            EventKind::HandoffResumed => "handoff.resumed",
        }
    }
}

/// A single entry in a submission's event log per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeEvent {
    pub event_id: EventId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub submission_id: SubmissionId,
    pub ts: DateTime<Utc>,
    pub actor: Actor,
    pub state: SubmissionState,
    pub payload: serde_json::Value,
    /// Gap-free, monotonically increasing per-submission sequence number.
    pub version: u64,
}

impl IntakeEvent {
    pub fn new(
        kind: EventKind,
        submission_id: SubmissionId,
        actor: Actor,
        state: SubmissionState,
        payload: serde_json::Value,
        version: u64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            kind,
            submission_id,
            ts: occurred_at,
            actor,
            state,
            payload,
            version,
        }
    }
}
