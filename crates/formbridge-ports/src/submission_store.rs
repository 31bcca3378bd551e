//! Submission store port per §4.E.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formbridge_domain::{Submission, SubmissionId, SubmissionState};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SubmissionStoreStats {
    pub by_state: HashMap<SubmissionState, u64>,
    pub by_intake: HashMap<String, u64>,
    pub pending_approval: u64,
    pub total: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionStoreError {
    #[error("connection error: {message}")]
    ConnectionError { message: String },
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist `submission`. Implementations must atomically rotate the
    /// resume-token index (old token removed, new token inserted) and
    /// maintain the incremental state/intake/pending-approval counters by
    /// `old.state -> new.state` delta — never by full rescan — per §4.E.
    async fn save(&self, submission: Submission) -> Result<(), SubmissionStoreError>;

    /// Load by primary id. `tenant_id`, when given, scopes the read —
    /// a record belonging to a different tenant is reported as absent,
    /// never as forbidden, per §4.E.
    async fn get_by_id(
        &self,
        id: &SubmissionId,
        tenant_id: Option<&str>,
    ) -> Result<Option<Submission>, SubmissionStoreError>;

    /// O(1) index lookup by the *current* resume token. An old, rotated
    /// token must resolve to `None`.
    async fn get_by_resume_token(&self, token: &str) -> Result<Option<Submission>, SubmissionStoreError>;

    /// Look up an existing submission for idempotent `create` replay.
    async fn get_by_idempotency_key(
        &self,
        tenant_id: Option<&str>,
        intake_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<Submission>, SubmissionStoreError>;

    /// Snapshot of the incrementally-maintained counters.
    async fn stats(&self) -> Result<SubmissionStoreStats, SubmissionStoreError>;

    /// Non-terminal submissions whose `expiresAt` is in the past, for the
    /// expiry scheduler (§4.K).
    async fn list_expired_non_terminal(&self, now: DateTime<Utc>) -> Result<Vec<Submission>, SubmissionStoreError>;

    /// Evict oldest-by-`updatedAt` terminal-state submissions until the
    /// store holds at most `max_entries`. Returns the number evicted.
    /// Idempotent: calling again with nothing left to evict is a no-op.
    async fn evict_terminal_over_budget(&self, max_entries: usize) -> Result<usize, SubmissionStoreError>;
}
