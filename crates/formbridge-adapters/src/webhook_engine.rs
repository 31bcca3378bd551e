//! Outbound webhook delivery engine per §4.I.
//!
//! Owns the `reqwest::Client` (via [`ReqwestWebhookSender`]) and the retry
//! arithmetic's orchestration: `enqueue_delivery` returns immediately with
//! a [`DeliveryId`] and spawns non-blocking delivery processing per §4.I's
//! "non-blocking guarantee." The pure payload/signing/header logic lives in
//! `formbridge_manager::webhook` — this module calls into it rather than
//! duplicating it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use formbridge_domain::{
    Actor, Destination, DeliveryId, DeliveryRecord, DeliveryStatus, EventKind, IntakeEvent,
    RetryPolicy, Submission,
};
use formbridge_ports::{
    Clock, DeliveryQueue, EventEmitter, EventStore, SubmissionStore, WebhookRequest,
    WebhookSendError, WebhookSender,
};

/// [`WebhookSender`] backed by a real `reqwest::Client`.
pub struct ReqwestWebhookSender {
    client: reqwest::Client,
}

impl ReqwestWebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for ReqwestWebhookSender {
    async fn send(&self, request: WebhookRequest) -> Result<formbridge_ports::WebhookResponse, WebhookSendError> {
        let mut builder = self.client.post(&request.url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                WebhookSendError::Timeout
            } else {
                WebhookSendError::Network { message: e.to_string() }
            }
        })?;
        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .unwrap_or_default();
        Ok(formbridge_ports::WebhookResponse { status_code, body })
    }
}

/// Configuration the engine needs beyond the retry policy itself.
#[derive(Debug, Clone)]
pub struct WebhookEngineConfig {
    pub retry_policy: RetryPolicy,
    pub signing_secret: Option<String>,
}

impl Default for WebhookEngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            signing_secret: None,
        }
    }
}

pub struct WebhookEngine {
    sender: Arc<dyn WebhookSender>,
    delivery_queue: Arc<dyn DeliveryQueue>,
    submissions: Arc<dyn SubmissionStore>,
    events: Arc<dyn EventStore>,
    emitter: Arc<dyn EventEmitter>,
    clock: Arc<dyn Clock>,
    config: WebhookEngineConfig,
}

impl WebhookEngine {
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        delivery_queue: Arc<dyn DeliveryQueue>,
        submissions: Arc<dyn SubmissionStore>,
        events: Arc<dyn EventStore>,
        emitter: Arc<dyn EventEmitter>,
        clock: Arc<dyn Clock>,
        config: WebhookEngineConfig,
    ) -> Self {
        Self {
            sender,
            delivery_queue,
            submissions,
            events,
            emitter,
            clock,
            config,
        }
    }

    /// The exact HTTP request a real delivery would send, without invoking
    /// the HTTP client, per §4.I's dry-run mode.
    pub fn dry_run(&self, submission: &Submission, destination: &Destination, now: DateTime<Utc>) -> WebhookRequest {
        let body = formbridge_manager::webhook::build_payload(submission);
        let signature = self
            .config
            .signing_secret
            .as_deref()
            .map(|secret| formbridge_manager::webhook::sign(&body, secret));
        let headers = formbridge_manager::webhook::build_headers(now, signature.as_deref(), &destination.headers);
        WebhookRequest {
            method: "POST".to_string(),
            url: destination.url.clone(),
            headers,
            body,
        }
    }

    /// Enqueue a delivery and return immediately. Processing happens on a
    /// spawned task — callers on the submit/approve code path must never
    /// await delivery completion, per §4.I's non-blocking guarantee.
    pub fn enqueue_delivery(self: &Arc<Self>, submission: Submission, destination: Destination) -> DeliveryId {
        let now = self.clock.now();
        let record = DeliveryRecord::pending(submission.submission_id.clone(), destination.url.clone(), now);
        let delivery_id = record.delivery_id.clone();
        let engine = Arc::clone(self);
        let record_for_spawn = record;
        tokio::spawn(async move {
            if let Err(e) = engine.delivery_queue.enqueue(record_for_spawn).await {
                error!(error = %e, "failed to persist delivery record");
                return;
            }
            engine.attempt(delivery_id, submission, destination, 1).await;
        });
        delivery_id
    }

    /// Resume a delivery whose `nextRetryAt` has passed — called by the
    /// retry scheduler after a restart, when the in-process spawned task
    /// from the original `enqueue_delivery` call no longer exists.
    pub async fn resume_pending(self: &Arc<Self>, record: DeliveryRecord) {
        let Ok(Some(submission)) = self.submissions.get_by_id(&record.submission_id, None).await else {
            warn!(submission_id = %record.submission_id, "cannot resume delivery: submission not found");
            return;
        };
        let destination = Destination {
            url: record.destination_url.clone(),
            headers: Default::default(),
        };
        let engine = Arc::clone(self);
        let attempt_number = record.attempts + 1;
        tokio::spawn(async move {
            engine.attempt(record.delivery_id, submission, destination, attempt_number).await;
        });
    }

    #[instrument(skip(self, submission, destination), fields(delivery_id = %delivery_id.as_str(), attempt))]
    async fn attempt(&self, delivery_id: DeliveryId, submission: Submission, destination: Destination, attempt: u32) {
        let now = self.clock.now();
        let request = self.dry_run(&submission, &destination, now);
        let body_len = request.body.len();

        self.record_submission_event(
            &submission,
            EventKind::DeliveryAttempted,
            serde_json::json!({"deliveryId": delivery_id.as_str(), "attempt": attempt, "bodyBytes": body_len}),
            now,
        )
        .await;

        match self.sender.send(request).await {
            Ok(response) if (200..300).contains(&response.status_code) => {
                self.succeed(delivery_id, submission, now, response.status_code).await;
            }
            Ok(response) => {
                self.fail_or_retry(
                    delivery_id,
                    submission,
                    destination,
                    attempt,
                    now,
                    Some(response.status_code),
                    format!("destination responded {}", response.status_code),
                )
                .await;
            }
            Err(e) => {
                self.fail_or_retry(delivery_id, submission, destination, attempt, now, None, e.to_string())
                    .await;
            }
        }
    }

    async fn succeed(&self, delivery_id: DeliveryId, submission: Submission, now: DateTime<Utc>, status_code: u16) {
        let update_result = self
            .delivery_queue
            .update(
                &delivery_id,
                Box::new(move |record| {
                    record.status = DeliveryStatus::Succeeded;
                    record.attempts += 1;
                    record.last_attempt_at = Some(now);
                    record.status_code = Some(status_code);
                    record.next_retry_at = None;
                }),
            )
            .await;
        if let Err(e) = update_result {
            error!(error = %e, "failed to mark delivery succeeded");
        }

        self.record_submission_event(
            &submission,
            EventKind::DeliverySucceeded,
            serde_json::json!({"deliveryId": delivery_id.as_str(), "statusCode": status_code}),
            now,
        )
        .await;

        self.finalize(submission, now).await;
    }

    async fn fail_or_retry(
        &self,
        delivery_id: DeliveryId,
        submission: Submission,
        destination: Destination,
        attempt: u32,
        now: DateTime<Utc>,
        status_code: Option<u16>,
        error: String,
    ) {
        let policy = self.config.retry_policy;
        if attempt >= policy.max_retries {
            let error_for_record = error.clone();
            let update_result = self
                .delivery_queue
                .update(
                    &delivery_id,
                    Box::new(move |record| {
                        record.status = DeliveryStatus::Failed;
                        record.attempts = attempt;
                        record.last_attempt_at = Some(now);
                        record.status_code = status_code;
                        record.error = Some(error_for_record);
                        record.next_retry_at = None;
                    }),
                )
                .await;
            if let Err(e) = update_result {
                error!(error = %e, "failed to mark delivery failed");
            }
            self.record_submission_event(
                &submission,
                EventKind::DeliveryFailed,
                serde_json::json!({"deliveryId": delivery_id.as_str(), "attempts": attempt, "error": error}),
                now,
            )
            .await;
            return;
        }

        let delay = StdDuration::from_millis(policy.delay_ms(attempt));
        let next_retry_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
        let status_for_record = status_code;
        let error_for_record = error;
        let update_result = self
            .delivery_queue
            .update(
                &delivery_id,
                Box::new(move |record| {
                    record.attempts = attempt;
                    record.last_attempt_at = Some(now);
                    record.status_code = status_for_record;
                    record.error = Some(error_for_record);
                    record.next_retry_at = Some(next_retry_at);
                }),
            )
            .await;
        if let Err(e) = update_result {
            error!(error = %e, "failed to record retry state");
        }

        tokio::time::sleep(delay).await;
        Box::pin(self.attempt(delivery_id, submission, destination, attempt + 1)).await;
    }

    /// Apply the `delivery.succeeded → finalized` transition per §4.F and
    /// emit `submission.finalized`, reloading the submission fresh from the
    /// store in case it changed since the attempt started.
    async fn finalize(&self, submission: Submission, now: DateTime<Utc>) {
        let Ok(Some(mut current)) = self.submissions.get_by_id(&submission.submission_id, None).await else {
            warn!(submission_id = %submission.submission_id, "submission vanished before delivery could finalize it");
            return;
        };
        let Ok(next_state) = formbridge_domain::SubmissionStateMachine::transition(
            Some(current.state),
            formbridge_domain::SubmissionTransition::DeliverySucceeded,
        ) else {
            // Already finalized/cancelled/expired out from under us — not
            // an error, just a race the state machine itself rejects.
            return;
        };
        current.state = next_state;
        current.updated_at = now;
        let version = current.version + 1;
        let event = IntakeEvent::new(
            EventKind::SubmissionFinalized,
            current.submission_id.clone(),
            Actor::system("webhook_engine"),
            current.state,
            serde_json::json!({}),
            version,
            now,
        );
        current.version = version;
        current.events.push(event.clone());
        if let Err(e) = self.events.append(event.clone()).await {
            error!(error = %e, "failed to append finalization event");
            return;
        }
        self.emitter.emit(&event).await;
        if let Err(e) = self.submissions.save(current).await {
            error!(error = %e, "failed to persist finalized submission");
        }
    }

    /// Append `kind` to the submission's own event stream — independent of
    /// the `finalized` transition above, since `delivery.attempted` /
    /// `delivery.succeeded` / `delivery.failed` are recorded against the
    /// submission regardless of whether a state change follows.
    async fn record_submission_event(
        &self,
        submission: &Submission,
        kind: EventKind,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        let Ok(Some(mut current)) = self.submissions.get_by_id(&submission.submission_id, None).await else {
            return;
        };
        let version = current.version + 1;
        let event = IntakeEvent::new(
            kind,
            current.submission_id.clone(),
            Actor::system("webhook_engine"),
            current.state,
            payload,
            version,
            now,
        );
        current.version = version;
        current.events.push(event.clone());
        if let Err(e) = self.events.append(event.clone()).await {
            error!(error = %e, "failed to append delivery event");
            return;
        }
        self.emitter.emit(&event).await;
        if let Err(e) = self.submissions.save(current).await {
            error!(error = %e, "failed to persist submission after delivery event");
        }
    }
}

/// Background task resuming deliveries whose `nextRetryAt` has passed,
/// necessary after a process restart drops any in-flight spawned tasks,
/// per §4.I / §4.K's scheduling model.
pub struct WebhookRetryScheduler {
    engine: Arc<WebhookEngine>,
    delivery_queue: Arc<dyn DeliveryQueue>,
    clock: Arc<dyn Clock>,
    tick_interval: StdDuration,
    stop: Arc<Notify>,
}

impl WebhookRetryScheduler {
    pub fn new(
        engine: Arc<WebhookEngine>,
        delivery_queue: Arc<dyn DeliveryQueue>,
        clock: Arc<dyn Clock>,
        tick_interval: StdDuration,
    ) -> Self {
        Self {
            engine,
            delivery_queue,
            clock,
            tick_interval,
            stop: Arc::new(Notify::new()),
        }
    }

    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<usize, formbridge_ports::DeliveryQueueError> {
        let now = self.clock.now();
        let due = self.delivery_queue.get_pending_retries(now).await?;
        let count = due.len();
        for record in due {
            self.engine.resume_pending(record).await;
        }
        if count > 0 {
            info!(resumed = count, "webhook retry scheduler tick");
        }
        Ok(count)
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let scheduler = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.tick().await {
                            error!(error = %e, "webhook retry scheduler tick failed");
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
    use crate::memory_delivery_queue::InMemoryDeliveryQueue;
    use crate::memory_event_store::InMemoryEventStore;
    use crate::memory_submission_store::InMemorySubmissionStore;
    use formbridge_domain::{ResumeToken, SubmissionId, SubmissionState};
    use formbridge_ports::{SystemClock, WebhookResponse};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct NullEmitter;
    #[async_trait]
    impl EventEmitter for NullEmitter {
        async fn emit(&self, _event: &IntakeEvent) {}
    }

    struct ScriptedSender {
        responses: std::sync::Mutex<Vec<Result<u16, &'static str>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebhookSender for ScriptedSender {
        async fn send(&self, _request: WebhookRequest) -> Result<WebhookResponse, WebhookSendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            match responses.remove(0) {
                Ok(status_code) => Ok(WebhookResponse { status_code, body: vec![] }),
                Err(msg) => Err(WebhookSendError::Network { message: msg.to_string() }),
            }
        }
    }

    fn sample_submission() -> Submission {
        let now = Utc::now();
        Submission {
            submission_id: SubmissionId::new(),
            intake_id: "vendor_onboarding".to_string(),
            tenant_id: "t1".to_string(),
            state: SubmissionState::Submitted,
            fields: HashMap::new(),
            field_attribution: HashMap::new(),
            uploads: HashMap::new(),
            resume_token: ResumeToken::new(),
            idempotency_key: None,
            created_at: now,
            created_by: Actor::system("test"),
            updated_at: now,
            expires_at: now + chrono::Duration::days(7),
            version: 1,
            delivery_id: None,
            events: vec![],
        }
    }

    #[tokio::test]
    async fn successful_first_attempt_finalizes_the_submission() {
        let submissions = Arc::new(InMemorySubmissionStore::new());
        let submission = sample_submission();
        submissions.save(submission.clone()).await.unwrap();

        let engine = Arc::new(WebhookEngine::new(
            Arc::new(ScriptedSender {
                responses: std::sync::Mutex::new(vec![Ok(200)]),
                calls: AtomicUsize::new(0),
            }),
            Arc::new(InMemoryDeliveryQueue::new()),
            submissions.clone(),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(NullEmitter),
            Arc::new(SystemClock),
            WebhookEngineConfig::default(),
        ));

        let destination = Destination {
            url: "https://example.com/hook".to_string(),
            headers: HashMap::new(),
        };
        let delivery_id = engine.enqueue_delivery(submission.clone(), destination);

        // Give the spawned task a chance to run to completion.
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let stored = submissions.get_by_id(&submission.submission_id, None).await.unwrap().unwrap();
        assert_eq!(stored.state, SubmissionState::Finalized);
        let _ = delivery_id;
    }

    #[tokio::test]
    async fn exhausted_retries_mark_the_delivery_failed() {
        let submissions = Arc::new(InMemorySubmissionStore::new());
        let submission = sample_submission();
        submissions.save(submission.clone()).await.unwrap();
        let delivery_queue = Arc::new(InMemoryDeliveryQueue::new());

        let engine = Arc::new(WebhookEngine::new(
            Arc::new(ScriptedSender {
                responses: std::sync::Mutex::new(vec![Err("refused"); 3]),
                calls: AtomicUsize::new(0),
            }),
            delivery_queue.clone(),
            submissions.clone(),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(NullEmitter),
            Arc::new(FixedClock(Utc::now())),
            WebhookEngineConfig {
                retry_policy: RetryPolicy {
                    max_retries: 3,
                    initial_delay_ms: 1,
                    max_delay_ms: 5,
                    backoff_multiplier: 1.0,
                },
                signing_secret: None,
            },
        ));

        let destination = Destination {
            url: "https://example.com/hook".to_string(),
            headers: HashMap::new(),
        };
        engine.enqueue_delivery(submission.clone(), destination);

        tokio::time::sleep(StdDuration::from_millis(200)).await;

        let records = delivery_queue.get_by_submission(&submission.submission_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DeliveryStatus::Failed);
        assert_eq!(records[0].attempts, 3);
    }
}
