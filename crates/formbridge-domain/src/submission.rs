//! The submission record per §3 and its state machine per §4.F.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::entities::{Actor, DeliveryId, ResumeToken, SubmissionId, UploadId};
use crate::events::IntakeEvent;

/// Lifecycle state of a submission per §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Draft,
    InProgress,
    AwaitingInput,
    AwaitingUpload,
    Submitted,
    NeedsReview,
    Approved,
    Rejected,
    Finalized,
    Cancelled,
    Expired,
}

impl SubmissionState {
    /// Terminal states accept no further transitions per §4.F.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionState::Finalized
                | SubmissionState::Rejected
                | SubmissionState::Cancelled
                | SubmissionState::Expired
        )
    }
}

/// Which field last changed a value and by whom — used to build
/// `fieldAttribution` in the outbound delivery payload per §4.I.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAttribution {
    pub actor: Actor,
    pub updated_at: DateTime<Utc>,
}

/// An upload negotiated against the storage backend per §4.J.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub upload_id: UploadId,
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A submission record per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub intake_id: String,
    pub tenant_id: String,
    pub state: SubmissionState,
    pub fields: HashMap<String, Value>,
    pub field_attribution: HashMap<String, FieldAttribution>,
    pub uploads: HashMap<String, UploadRecord>,
    pub resume_token: ResumeToken,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Actor,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Gap-free per-submission event sequence; doubles as the
    /// optimistic-concurrency token for writes.
    pub version: u64,
    pub delivery_id: Option<DeliveryId>,
    /// In-line copy of the event log for single-read retrieval per §3. The
    /// event store (§4.D) holds the durable copy; this is a read-path
    /// convenience that must always match it.
    pub events: Vec<IntakeEvent>,
}

impl Submission {
    /// Whether `candidate` is the live resume token for this submission.
    pub fn token_matches(&self, candidate: &str) -> bool {
        self.resume_token.constant_time_eq(candidate)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Field names a submission may never set, per §4.G ("Reject field names
/// in the reserved set").
pub const RESERVED_FIELD_NAMES: &[&str] = &["__proto__", "constructor", "prototype", "__uploads"];

/// Whether `fields` contains a reserved top-level key.
pub fn contains_reserved_field(fields: &HashMap<String, Value>) -> Option<&'static str> {
    RESERVED_FIELD_NAMES.iter().copied().find(|reserved| fields.contains_key(*reserved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_the_four_named_in_the_transition_table() {
        assert!(SubmissionState::Finalized.is_terminal());
        assert!(SubmissionState::Rejected.is_terminal());
        assert!(SubmissionState::Cancelled.is_terminal());
        assert!(SubmissionState::Expired.is_terminal());
        assert!(!SubmissionState::InProgress.is_terminal());
        assert!(!SubmissionState::NeedsReview.is_terminal());
    }

    #[test]
    fn reserved_field_names_are_detected() {
        let mut fields = HashMap::new();
        fields.insert("__proto__".to_string(), serde_json::json!(1));
        assert_eq!(contains_reserved_field(&fields), Some("__proto__"));
    }

    #[test]
    fn ordinary_fields_are_not_flagged_as_reserved() {
        let mut fields = HashMap::new();
        fields.insert("legal_name".to_string(), serde_json::json!("Acme"));
        assert_eq!(contains_reserved_field(&fields), None);
    }
}
