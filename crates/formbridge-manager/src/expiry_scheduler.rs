//! Expiry + eviction scheduler per §4.K: a background task that expires
//! stalled non-terminal submissions and evicts terminal records down to a
//! configured budget. Idempotent under restart — each tick is a pure
//! read-then-conditional-write with no external side state.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use formbridge_domain::{Actor, EventKind, IntakeEvent};
use formbridge_ports::{Clock, EventEmitter, EventStore, SubmissionStore};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

pub struct ExpirySchedulerConfig {
    pub tick_interval: StdDuration,
    pub max_entries: usize,
}

impl Default for ExpirySchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_millis(60_000),
            max_entries: 100_000,
        }
    }
}

pub struct ExpiryScheduler {
    submissions: Arc<dyn SubmissionStore>,
    events: Arc<dyn EventStore>,
    emitter: Arc<dyn EventEmitter>,
    clock: Arc<dyn Clock>,
    config: ExpirySchedulerConfig,
    stop: Arc<Notify>,
}

impl ExpiryScheduler {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        events: Arc<dyn EventStore>,
        emitter: Arc<dyn EventEmitter>,
        clock: Arc<dyn Clock>,
        config: ExpirySchedulerConfig,
    ) -> Self {
        Self {
            submissions,
            events,
            emitter,
            clock,
            config,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Run one tick directly — exposed separately from `start` so tests can
    /// drive it deterministically without sleeping.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<(usize, usize), formbridge_ports::SubmissionStoreError> {
        let now = self.clock.now();
        let expired = self.submissions.list_expired_non_terminal(now).await?;
        let expired_count = expired.len();
        for mut submission in expired {
            submission.state = formbridge_domain::SubmissionState::Expired;
            submission.updated_at = now;
            let version = submission.version + 1;
            let event = IntakeEvent::new(
                EventKind::SubmissionExpired,
                submission.submission_id.clone(),
                Actor::system("expiry_scheduler"),
                submission.state,
                serde_json::json!({}),
                version,
                now,
            );
            submission.version = version;
            submission.events.push(event.clone());
            if let Err(e) = self.events.append(event.clone()).await {
                error!(error = %e, submission_id = %submission.submission_id, "failed to append expiry event");
                continue;
            }
            self.emitter.emit(&event).await;
            if let Err(e) = self.submissions.save(submission).await {
                error!(error = %e, "failed to persist expired submission");
            }
        }

        let evicted = self.submissions.evict_terminal_over_budget(self.config.max_entries).await?;
        if expired_count > 0 || evicted > 0 {
            info!(expired = expired_count, evicted, "expiry scheduler tick");
        }
        Ok((expired_count, evicted))
    }

    /// Spawn the background tick loop. Returns a handle plus a stop signal;
    /// dropping the returned `ExpirySchedulerHandle` without calling `stop`
    /// leaves the task running until the process exits.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let scheduler = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.tick().await {
                            error!(error = %e, "expiry scheduler tick failed");
                        }
                    }
                    _ = scheduler.stop.notified() => break,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_domain::{ResumeToken, Submission, SubmissionId, SubmissionState};
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct MemSubmissionStore {
        submissions: Mutex<Vec<Submission>>,
        evict_calls: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl SubmissionStore for MemSubmissionStore {
        async fn save(&self, submission: Submission) -> Result<(), formbridge_ports::SubmissionStoreError> {
            let mut guard = self.submissions.lock().unwrap();
            if let Some(existing) = guard.iter_mut().find(|s| s.submission_id == submission.submission_id) {
                *existing = submission;
            } else {
                guard.push(submission);
            }
            Ok(())
        }
        async fn get_by_id(&self, id: &SubmissionId, _tenant_id: Option<&str>) -> Result<Option<Submission>, formbridge_ports::SubmissionStoreError> {
            Ok(self.submissions.lock().unwrap().iter().find(|s| &s.submission_id == id).cloned())
        }
        async fn get_by_resume_token(&self, _token: &str) -> Result<Option<Submission>, formbridge_ports::SubmissionStoreError> {
            Ok(None)
        }
        async fn get_by_idempotency_key(
            &self,
            _tenant_id: Option<&str>,
            _intake_id: &str,
            _idempotency_key: &str,
        ) -> Result<Option<Submission>, formbridge_ports::SubmissionStoreError> {
            Ok(None)
        }
        async fn stats(&self) -> Result<formbridge_ports::SubmissionStoreStats, formbridge_ports::SubmissionStoreError> {
            Ok(formbridge_ports::SubmissionStoreStats::default())
        }
        async fn list_expired_non_terminal(&self, now: DateTime<Utc>) -> Result<Vec<Submission>, formbridge_ports::SubmissionStoreError> {
            Ok(self
                .submissions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| !s.state.is_terminal() && s.expires_at < now)
                .cloned()
                .collect())
        }
        async fn evict_terminal_over_budget(&self, max_entries: usize) -> Result<usize, formbridge_ports::SubmissionStoreError> {
            self.evict_calls.lock().unwrap().push(max_entries);
            Ok(0)
        }
    }

    #[derive(Default)]
    struct MemEventStore {
        appended: Mutex<Vec<IntakeEvent>>,
    }

    #[async_trait::async_trait]
    impl EventStore for MemEventStore {
        async fn append(&self, event: IntakeEvent) -> Result<(), formbridge_ports::EventStoreError> {
            self.appended.lock().unwrap().push(event);
            Ok(())
        }
        async fn list(&self, _submission_id: &SubmissionId, _filter: &formbridge_ports::EventFilter) -> Result<Vec<IntakeEvent>, formbridge_ports::EventStoreError> {
            Ok(vec![])
        }
        async fn count(&self, _submission_id: &SubmissionId, _filter: &formbridge_ports::EventFilter) -> Result<usize, formbridge_ports::EventStoreError> {
            Ok(0)
        }
    }

    struct NullEmitter;
    #[async_trait::async_trait]
    impl EventEmitter for NullEmitter {
        async fn emit(&self, _event: &IntakeEvent) {}
    }

    fn stale_submission(expires_at: DateTime<Utc>, state: SubmissionState) -> Submission {
        let now = Utc::now();
        Submission {
            submission_id: SubmissionId::new(),
            intake_id: "vendor_onboarding".to_string(),
            tenant_id: String::new(),
            state,
            fields: HashMap::new(),
            field_attribution: HashMap::new(),
            uploads: HashMap::new(),
            resume_token: ResumeToken::new(),
            idempotency_key: None,
            created_at: now,
            created_by: Actor::system("test"),
            updated_at: now,
            expires_at,
            version: 1,
            delivery_id: None,
            events: vec![],
        }
    }

    #[tokio::test]
    async fn tick_expires_non_terminal_submissions_past_their_ttl() {
        let now = Utc::now();
        let store = Arc::new(MemSubmissionStore::default());
        store.save(stale_submission(now - Duration::seconds(1), SubmissionState::InProgress)).await.unwrap();
        let scheduler = ExpiryScheduler::new(
            store.clone(),
            Arc::new(MemEventStore::default()),
            Arc::new(NullEmitter),
            Arc::new(FixedClock(now)),
            ExpirySchedulerConfig::default(),
        );
        let (expired, _) = scheduler.tick().await.unwrap();
        assert_eq!(expired, 1);
        assert_eq!(store.submissions.lock().unwrap()[0].state, SubmissionState::Expired);
    }

    #[tokio::test]
    async fn tick_never_touches_already_finalized_submissions() {
        let now = Utc::now();
        let store = Arc::new(MemSubmissionStore::default());
        store.save(stale_submission(now - Duration::seconds(1), SubmissionState::Finalized)).await.unwrap();
        let scheduler = ExpiryScheduler::new(
            store.clone(),
            Arc::new(MemEventStore::default()),
            Arc::new(NullEmitter),
            Arc::new(FixedClock(now)),
            ExpirySchedulerConfig::default(),
        );
        let (expired, _) = scheduler.tick().await.unwrap();
        assert_eq!(expired, 0);
        assert_eq!(store.submissions.lock().unwrap()[0].state, SubmissionState::Finalized);
    }
}
