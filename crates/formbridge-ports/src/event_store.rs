//! Event store port per §4.D.
//!
//! The append-only per-submission event log. `append` enforces monotonic,
//! gap-free `version` and rejects duplicate `eventId`s; `list`/`count`
//! share one filter shape so pagination metadata never requires a second,
//! unfiltered read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formbridge_domain::{ActorKind, EventKind, IntakeEvent, SubmissionId};

/// Shared filter shape for both `list` and `count` per §4.D.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<EventKind>>,
    pub actor_kind: Option<ActorKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventFilter {
    pub fn matches(&self, event: &IntakeEvent) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(actor_kind) = self.actor_kind {
            if event.actor.kind != actor_kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.ts < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.ts > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("version conflict for submission {submission_id}: expected {expected}, store is at {actual}")]
    VersionConflict {
        submission_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("duplicate event id {event_id}")]
    DuplicateEventId { event_id: String },
    #[error("connection error: {message}")]
    ConnectionError { message: String },
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event. Callers must pass events with a strictly
    /// increasing `version` per submission; implementations reject
    /// anything else as a [`EventStoreError::VersionConflict`].
    async fn append(&self, event: IntakeEvent) -> Result<(), EventStoreError>;

    /// Filtered, paginated read of a submission's event stream.
    async fn list(
        &self,
        submission_id: &SubmissionId,
        filter: &EventFilter,
    ) -> Result<Vec<IntakeEvent>, EventStoreError>;

    /// Count matching events without materializing them — so pagination
    /// metadata never requires re-reading all events per §4.D.
    async fn count(&self, submission_id: &SubmissionId, filter: &EventFilter) -> Result<usize, EventStoreError>;
}
