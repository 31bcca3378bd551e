//! In-memory `SubmissionStore` per §4.E.
//!
//! Default implementation used by tests and by the API when no durable
//! backend is configured. Holds a primary map plus two secondary indexes
//! (resume token → id, `(tenant, intake, idempotency_key)` → id) behind a
//! single `tokio::sync::RwLock` so index rotation on `save` is observed as
//! one atomic step by concurrent readers, per §5's token-rotation
//! atomicity rule.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use formbridge_domain::{Submission, SubmissionId, SubmissionState};
use formbridge_ports::{SubmissionStore, SubmissionStoreError, SubmissionStoreStats};

struct Indexes {
    by_id: HashMap<String, Submission>,
    by_resume_token: HashMap<String, String>,
    by_idempotency: HashMap<(String, String, String), String>,
    stats: SubmissionStoreStats,
}

impl Indexes {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_resume_token: HashMap::new(),
            by_idempotency: HashMap::new(),
            stats: SubmissionStoreStats::default(),
        }
    }

    fn idempotency_key(submission: &Submission) -> Option<(String, String, String)> {
        submission.idempotency_key.as_ref().map(|key| {
            (
                submission.tenant_id.clone(),
                submission.intake_id.clone(),
                key.clone(),
            )
        })
    }

    /// Move the incremental counters from `old` (if any) to `new`'s state,
    /// per §4.E: "maintained on save by `old.state → new.state` delta;
    /// never recomputed by scan."
    fn apply_counters(&mut self, old: Option<&Submission>, new: &Submission) {
        if let Some(old) = old {
            if let Some(count) = self.stats.by_state.get_mut(&old.state) {
                *count = count.saturating_sub(1);
            }
            if let Some(count) = self.stats.by_intake.get_mut(&old.intake_id) {
                *count = count.saturating_sub(1);
            }
            if old.state == SubmissionState::NeedsReview {
                self.stats.pending_approval = self.stats.pending_approval.saturating_sub(1);
            }
        } else {
            self.stats.total += 1;
        }
        *self.stats.by_state.entry(new.state).or_insert(0) += 1;
        *self.stats.by_intake.entry(new.intake_id.clone()).or_insert(0) += 1;
        if new.state == SubmissionState::NeedsReview {
            self.stats.pending_approval += 1;
        }
    }
}

pub struct InMemorySubmissionStore {
    inner: RwLock<Indexes>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexes::new()),
        }
    }
}

impl Default for InMemorySubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn save(&self, submission: Submission) -> Result<(), SubmissionStoreError> {
        let mut indexes = self.inner.write().await;
        let id = submission.submission_id.as_str().to_string();

        let old = indexes.by_id.get(&id).cloned();
        indexes.apply_counters(old.as_ref(), &submission);

        if let Some(old) = &old {
            indexes.by_resume_token.remove(old.resume_token.as_str());
            if let Some(key) = Indexes::idempotency_key(old) {
                if key != Indexes::idempotency_key(&submission).unwrap_or_default() {
                    indexes.by_idempotency.remove(&key);
                }
            }
        }
        indexes
            .by_resume_token
            .insert(submission.resume_token.as_str().to_string(), id.clone());
        if let Some(key) = Indexes::idempotency_key(&submission) {
            indexes.by_idempotency.insert(key, id.clone());
        }
        indexes.by_id.insert(id, submission);
        Ok(())
    }

    async fn get_by_id(
        &self,
        id: &SubmissionId,
        tenant_id: Option<&str>,
    ) -> Result<Option<Submission>, SubmissionStoreError> {
        let indexes = self.inner.read().await;
        Ok(indexes
            .by_id
            .get(id.as_str())
            .filter(|s| tenant_id.map(|t| t == s.tenant_id).unwrap_or(true))
            .cloned())
    }

    async fn get_by_resume_token(&self, token: &str) -> Result<Option<Submission>, SubmissionStoreError> {
        let indexes = self.inner.read().await;
        let Some(id) = indexes.by_resume_token.get(token) else {
            return Ok(None);
        };
        Ok(indexes.by_id.get(id).cloned())
    }

    async fn get_by_idempotency_key(
        &self,
        tenant_id: Option<&str>,
        intake_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<Submission>, SubmissionStoreError> {
        let indexes = self.inner.read().await;
        let key = (
            tenant_id.unwrap_or_default().to_string(),
            intake_id.to_string(),
            idempotency_key.to_string(),
        );
        let Some(id) = indexes.by_idempotency.get(&key) else {
            return Ok(None);
        };
        Ok(indexes.by_id.get(id).cloned())
    }

    async fn stats(&self) -> Result<SubmissionStoreStats, SubmissionStoreError> {
        Ok(self.inner.read().await.stats.clone())
    }

    async fn list_expired_non_terminal(&self, now: DateTime<Utc>) -> Result<Vec<Submission>, SubmissionStoreError> {
        let indexes = self.inner.read().await;
        Ok(indexes
            .by_id
            .values()
            .filter(|s| !s.state.is_terminal() && s.is_expired(now))
            .cloned()
            .collect())
    }

    async fn evict_terminal_over_budget(&self, max_entries: usize) -> Result<usize, SubmissionStoreError> {
        let mut indexes = self.inner.write().await;
        if indexes.by_id.len() <= max_entries {
            return Ok(0);
        }
        let mut terminal: Vec<(String, DateTime<Utc>)> = indexes
            .by_id
            .values()
            .filter(|s| s.state.is_terminal())
            .map(|s| (s.submission_id.as_str().to_string(), s.updated_at))
            .collect();
        terminal.sort_by_key(|(_, updated_at)| *updated_at);

        let to_remove = indexes.by_id.len().saturating_sub(max_entries).min(terminal.len());
        let mut evicted = 0;
        for (id, _) in terminal.into_iter().take(to_remove) {
            if let Some(submission) = indexes.by_id.remove(&id) {
                indexes.by_resume_token.remove(submission.resume_token.as_str());
                if let Some(key) = Indexes::idempotency_key(&submission) {
                    indexes.by_idempotency.remove(&key);
                }
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_domain::{Actor, ResumeToken};
    use std::collections::HashMap as Map;

    fn sample(state: SubmissionState, updated_at: DateTime<Utc>) -> Submission {
        let now = Utc::now();
        Submission {
            submission_id: SubmissionId::new(),
            intake_id: "vendor_onboarding".to_string(),
            tenant_id: "t1".to_string(),
            state,
            fields: Map::new(),
            field_attribution: Map::new(),
            uploads: Map::new(),
            resume_token: ResumeToken::new(),
            idempotency_key: None,
            created_at: now,
            created_by: Actor::system("test"),
            updated_at,
            expires_at: now + chrono::Duration::days(7),
            version: 1,
            delivery_id: None,
            events: vec![],
        }
    }

    #[tokio::test]
    async fn save_then_get_by_id_round_trips() {
        let store = InMemorySubmissionStore::new();
        let submission = sample(SubmissionState::Draft, Utc::now());
        let id = submission.submission_id.clone();
        store.save(submission).await.unwrap();
        assert!(store.get_by_id(&id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cross_tenant_read_reports_not_found_not_forbidden() {
        let store = InMemorySubmissionStore::new();
        let submission = sample(SubmissionState::Draft, Utc::now());
        let id = submission.submission_id.clone();
        store.save(submission).await.unwrap();
        assert!(store.get_by_id(&id, Some("other-tenant")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn old_resume_token_is_invalidated_after_rotation() {
        let store = InMemorySubmissionStore::new();
        let mut submission = sample(SubmissionState::Draft, Utc::now());
        let old_token = submission.resume_token.as_str().to_string();
        store.save(submission.clone()).await.unwrap();

        submission.resume_token = ResumeToken::new();
        store.save(submission.clone()).await.unwrap();

        assert!(store.get_by_resume_token(&old_token).await.unwrap().is_none());
        assert!(store
            .get_by_resume_token(submission.resume_token.as_str())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn idempotency_key_replay_resolves_to_the_same_record() {
        let store = InMemorySubmissionStore::new();
        let mut submission = sample(SubmissionState::Draft, Utc::now());
        submission.idempotency_key = Some("K-1".to_string());
        let id = submission.submission_id.clone();
        store.save(submission).await.unwrap();

        let found = store
            .get_by_idempotency_key(Some("t1"), "vendor_onboarding", "K-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.submission_id, id);
    }

    #[tokio::test]
    async fn stats_track_state_and_intake_counts_incrementally() {
        let store = InMemorySubmissionStore::new();
        let submission = sample(SubmissionState::Draft, Utc::now());
        store.save(submission.clone()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(*stats.by_state.get(&SubmissionState::Draft).unwrap(), 1);

        let mut moved = submission;
        moved.state = SubmissionState::InProgress;
        store.save(moved).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 1, "total must not double-count a re-saved record");
        assert_eq!(stats.by_state.get(&SubmissionState::Draft).copied().unwrap_or(0), 0);
        assert_eq!(*stats.by_state.get(&SubmissionState::InProgress).unwrap(), 1);
    }

    #[tokio::test]
    async fn eviction_removes_oldest_terminal_records_first() {
        let store = InMemorySubmissionStore::new();
        let now = Utc::now();
        let old = sample(SubmissionState::Finalized, now - chrono::Duration::hours(2));
        let newer = sample(SubmissionState::Finalized, now - chrono::Duration::hours(1));
        let non_terminal = sample(SubmissionState::InProgress, now);
        let old_id = old.submission_id.clone();
        let newer_id = newer.submission_id.clone();

        store.save(old).await.unwrap();
        store.save(newer).await.unwrap();
        store.save(non_terminal).await.unwrap();

        let evicted = store.evict_terminal_over_budget(2).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(store.get_by_id(&old_id, None).await.unwrap().is_none());
        assert!(store.get_by_id(&newer_id, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn eviction_is_idempotent_once_within_budget() {
        let store = InMemorySubmissionStore::new();
        store.save(sample(SubmissionState::Finalized, Utc::now())).await.unwrap();
        assert_eq!(store.evict_terminal_over_budget(10).await.unwrap(), 0);
        assert_eq!(store.evict_terminal_over_budget(10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_expired_non_terminal_excludes_terminal_and_future_expiry() {
        let store = InMemorySubmissionStore::new();
        let now = Utc::now();
        let mut expired = sample(SubmissionState::InProgress, now);
        expired.expires_at = now - chrono::Duration::seconds(1);
        let mut live = sample(SubmissionState::InProgress, now);
        live.expires_at = now + chrono::Duration::days(1);
        let mut expired_but_terminal = sample(SubmissionState::Finalized, now);
        expired_but_terminal.expires_at = now - chrono::Duration::seconds(1);

        store.save(expired.clone()).await.unwrap();
        store.save(live).await.unwrap();
        store.save(expired_but_terminal).await.unwrap();

        let found = store.list_expired_non_terminal(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].submission_id, expired.submission_id);
    }
}
