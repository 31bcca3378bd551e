//! The submission manager per §4.G — the core orchestration surface both
//! external entry points (HTTP handlers, tool-surface adapter) call through.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use formbridge_domain::validator::{self, FieldError, ValidationMode};
use formbridge_domain::{
    contains_reserved_field, Actor, EventKind, FieldAttribution, FieldSchema,
    IntakeEvent, IntakeRegistry, ResumeToken, Submission, SubmissionId, SubmissionState,
    SubmissionStateMachine, SubmissionTransition, UploadRecord,
};
use formbridge_ports::{Clock, EventEmitter, EventStore, SubmissionStore};

use crate::errors::{ManagerError, ManagerResult};

/// The caller-facing shape of a submission, built fresh from the stored
/// record on every read so it never drifts from what was just persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submission_id: String,
    pub intake_id: String,
    pub tenant_id: String,
    pub state: SubmissionState,
    pub fields: HashMap<String, Value>,
    pub field_attribution: HashMap<String, FieldAttribution>,
    pub uploads: HashMap<String, UploadRecord>,
    pub resume_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<FieldSchema>,
    /// `true` when the submission just routed to `needs_review` rather than
    /// `submitted` — callers surface this as `error.type = needs_approval`
    /// with `ok = true` semantics per §4.G, not as a hard failure.
    pub needs_approval: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandoffView {
    pub submission_id: String,
    pub resume_token: String,
    pub handoff_url: String,
}

pub struct SubmissionManager {
    intakes: Arc<IntakeRegistry>,
    submissions: Arc<dyn SubmissionStore>,
    events: Arc<dyn EventStore>,
    emitter: Arc<dyn EventEmitter>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
    base_url: String,
}

impl SubmissionManager {
    pub fn new(
        intakes: Arc<IntakeRegistry>,
        submissions: Arc<dyn SubmissionStore>,
        events: Arc<dyn EventStore>,
        emitter: Arc<dyn EventEmitter>,
        clock: Arc<dyn Clock>,
        token_ttl: Duration,
        base_url: String,
    ) -> Self {
        Self {
            intakes,
            submissions,
            events,
            emitter,
            clock,
            token_ttl,
            base_url,
        }
    }

    /// Append one event to the in-record log, the durable store, and the
    /// live fan-out emitter. The durable append is the source of truth; a
    /// failed emit is swallowed by the emitter itself (§5 isolation rule)
    /// and never reaches this call site as an error.
    async fn record_event(
        &self,
        submission: &mut Submission,
        kind: EventKind,
        actor: Actor,
        payload: Value,
        now: DateTime<Utc>,
    ) -> ManagerResult<()> {
        let version = submission.version + 1;
        let event = IntakeEvent::new(kind, submission.submission_id.clone(), actor, submission.state, payload, version, now);
        submission.version = version;
        submission.events.push(event.clone());
        self.events.append(event.clone()).await?;
        self.emitter.emit(&event).await;
        Ok(())
    }

    fn view(&self, submission: &Submission, needs_approval: bool, with_schema: bool) -> SubmissionView {
        let schema = if with_schema {
            self.intakes.get(&submission.intake_id).map(|intake| intake.schema)
        } else {
            None
        };
        SubmissionView {
            submission_id: submission.submission_id.as_str().to_string(),
            intake_id: submission.intake_id.clone(),
            tenant_id: submission.tenant_id.clone(),
            state: submission.state,
            fields: submission.fields.clone(),
            field_attribution: submission.field_attribution.clone(),
            uploads: submission.uploads.clone(),
            resume_token: submission.resume_token.as_str().to_string(),
            created_at: submission.created_at,
            updated_at: submission.updated_at,
            expires_at: submission.expires_at,
            version: submission.version,
            schema,
            needs_approval,
        }
    }

    async fn load_for_id(&self, submission_id: &SubmissionId, tenant_id: Option<&str>) -> ManagerResult<Submission> {
        self.submissions
            .get_by_id(submission_id, tenant_id)
            .await?
            .ok_or_else(ManagerError::not_found)
    }

    /// Pre-flight shared by every mutating operation per §4.G's failure
    /// semantics: not-found/cross-tenant collapse to the same error, and
    /// token comparison always runs in constant time.
    async fn load_and_authorize(
        &self,
        submission_id: &SubmissionId,
        tenant_id: Option<&str>,
        resume_token: &str,
    ) -> ManagerResult<Submission> {
        let submission = self.load_for_id(submission_id, tenant_id).await?;
        if !submission.token_matches(resume_token) {
            return Err(ManagerError::invalid_resume_token());
        }
        Ok(submission)
    }

    #[instrument(skip(self, actor, initial_fields), fields(intake_id = %intake_id))]
    pub async fn create(
        &self,
        intake_id: &str,
        actor: Actor,
        initial_fields: Option<HashMap<String, Value>>,
        idempotency_key: Option<String>,
        tenant_id: Option<String>,
    ) -> ManagerResult<SubmissionView> {
        let intake = self
            .intakes
            .get(intake_id)
            .ok_or_else(|| ManagerError::with_message(formbridge_domain::ErrorKind::NotFound, "unknown intake"))?;

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self
                .submissions
                .get_by_idempotency_key(tenant_id.as_deref(), intake_id, key)
                .await?
            {
                info!(submission_id = %existing.submission_id, "replayed idempotent create");
                return Ok(self.view(&existing, false, false));
            }
        }

        let initial_fields = initial_fields.unwrap_or_default();
        if let Some(reserved) = contains_reserved_field(&initial_fields) {
            return Err(ManagerError::validation(vec![FieldError {
                field: reserved.to_string(),
                message: format!("{reserved} is a reserved field name"),
                code: validator::ErrorCode::InvalidValue,
            }]));
        }

        let now = self.clock.now();
        let submission_id = SubmissionId::new();
        let tenant = tenant_id.unwrap_or_default();

        let mut submission = Submission {
            submission_id: submission_id.clone(),
            intake_id: intake_id.to_string(),
            tenant_id: tenant,
            state: SubmissionStateMachine::transition(None, SubmissionTransition::CreateEmpty)?,
            fields: HashMap::new(),
            field_attribution: HashMap::new(),
            uploads: HashMap::new(),
            resume_token: ResumeToken::new(),
            idempotency_key: idempotency_key.clone(),
            created_at: now,
            created_by: actor.clone(),
            updated_at: now,
            expires_at: now + self.token_ttl,
            version: 0,
            delivery_id: None,
            events: Vec::new(),
        };
        self.record_event(
            &mut submission,
            EventKind::SubmissionCreated,
            actor.clone(),
            serde_json::json!({ "intakeId": intake_id }),
            now,
        )
        .await?;
        self.submissions.save(submission.clone()).await?;

        if !initial_fields.is_empty() {
            self.apply_fields_write(&mut submission, &intake.schema, actor, initial_fields, now).await?;
            self.submissions.save(submission.clone()).await?;
        }

        Ok(self.view(&submission, false, false))
    }

    /// Shared merge/transition/rotate/emit logic for a single field write,
    /// used both by `create`'s initial-fields path and by `set_fields`.
    /// Validates, rejects reserved names, and returns before mutating
    /// anything on failure — partial failures never rotate the token.
    async fn apply_fields_write(
        &self,
        submission: &mut Submission,
        schema: &FieldSchema,
        actor: Actor,
        fields: HashMap<String, Value>,
        now: DateTime<Utc>,
    ) -> ManagerResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        if let Some(reserved) = contains_reserved_field(&fields) {
            return Err(ManagerError::validation(vec![FieldError {
                field: reserved.to_string(),
                message: format!("{reserved} is a reserved field name"),
                code: validator::ErrorCode::InvalidValue,
            }]));
        }

        let errors = validator::validate(schema, &fields, ValidationMode::Partial);
        if !errors.is_empty() {
            return Err(ManagerError::validation(errors));
        }

        let touches_file_field = fields
            .keys()
            .any(|path| matches!(schema_field_type(schema, path), Some(formbridge_domain::FieldType::File)));

        let next_state = SubmissionStateMachine::for_set_fields(Some(submission.state), touches_file_field)?;

        for (path, value) in fields {
            submission.fields.insert(path.clone(), value.clone());
            submission.field_attribution.insert(
                path.clone(),
                FieldAttribution {
                    actor: actor.clone(),
                    updated_at: now,
                },
            );
            self.record_event(
                submission,
                EventKind::FieldUpdated,
                actor.clone(),
                serde_json::json!({ "field": path, "value": value }),
                now,
            )
            .await?;
        }

        submission.state = next_state;
        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;
        Ok(())
    }

    #[instrument(skip(self, actor, fields), fields(submission_id = %submission_id))]
    pub async fn set_fields(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
        fields: HashMap<String, Value>,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.load_and_authorize(submission_id, tenant_id, resume_token).await?;
        let intake = self
            .intakes
            .get(&submission.intake_id)
            .ok_or_else(|| ManagerError::internal("intake definition missing for an existing submission"))?;
        let now = self.clock.now();

        self.apply_fields_write(&mut submission, &intake.schema, actor, fields, now).await?;
        self.submissions.save(submission.clone()).await?;
        Ok(self.view(&submission, false, false))
    }

    #[instrument(skip(self), fields(submission_id = %submission_id))]
    pub async fn validate(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.load_and_authorize(submission_id, tenant_id, resume_token).await?;
        let intake = self
            .intakes
            .get(&submission.intake_id)
            .ok_or_else(|| ManagerError::internal("intake definition missing for an existing submission"))?;
        let now = self.clock.now();

        let errors = validator::validate(&intake.schema, &submission.fields, ValidationMode::Full);
        let actor = Actor::system("validator");
        if !errors.is_empty() {
            self.record_event(
                &mut submission,
                EventKind::ValidationFailed,
                actor,
                serde_json::json!({ "errors": errors }),
                now,
            )
            .await?;
            self.submissions.save(submission.clone()).await?;
            return Err(ManagerError::validation(errors));
        }

        self.record_event(&mut submission, EventKind::ValidationPassed, actor, serde_json::json!({}), now)
            .await?;
        submission.updated_at = now;
        self.submissions.save(submission.clone()).await?;
        Ok(self.view(&submission, false, false))
    }

    #[instrument(skip(self, actor), fields(submission_id = %submission_id))]
    pub async fn submit(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.load_and_authorize(submission_id, tenant_id, resume_token).await?;
        let intake = self
            .intakes
            .get(&submission.intake_id)
            .ok_or_else(|| ManagerError::internal("intake definition missing for an existing submission"))?;
        let now = self.clock.now();

        let errors = validator::validate(&intake.schema, &submission.fields, ValidationMode::Full);
        if !errors.is_empty() {
            return Err(ManagerError::validation(errors));
        }

        let mut needs_review = false;
        for gate in &intake.approval_gates {
            match formbridge_domain::approval_gate::evaluate(&gate.condition, &submission.fields) {
                Ok(true) => {
                    needs_review = true;
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    warn!(gate = %gate.id, error = %e, "approval gate condition failed to evaluate");
                    return Err(ManagerError::internal(format!("approval gate {} is misconfigured: {e}", gate.id)));
                }
            }
        }

        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;

        if needs_review {
            submission.state = SubmissionStateMachine::transition(Some(submission.state), SubmissionTransition::SubmitNeedsReview)?;
            self.record_event(&mut submission, EventKind::ReviewRequested, actor, serde_json::json!({}), now)
                .await?;
            self.submissions.save(submission.clone()).await?;
            return Ok(self.view(&submission, true, false));
        }

        submission.state = SubmissionStateMachine::transition(Some(submission.state), SubmissionTransition::SubmitClean)?;
        self.record_event(&mut submission, EventKind::SubmissionSubmitted, actor, serde_json::json!({}), now)
            .await?;
        self.submissions.save(submission.clone()).await?;

        // Delivery dispatch happens at the app seam, which is the only
        // place both the pure core and the webhook engine are in scope
        // (see formbridge-api's `delivery::dispatch_if_pending`) — it mints
        // the one true `DeliveryRecord` and writes its id back here.
        Ok(self.view(&submission, false, false))
    }

    #[instrument(skip(self), fields(token = "<redacted>"))]
    pub async fn get_by_resume_token(&self, token: &str) -> ManagerResult<SubmissionView> {
        let submission = self
            .submissions
            .get_by_resume_token(token)
            .await?
            .ok_or_else(ManagerError::not_found)?;
        let now = self.clock.now();
        if submission.is_expired(now) {
            return Err(ManagerError::expired());
        }
        Ok(self.view(&submission, false, true))
    }

    pub async fn get_by_id(&self, submission_id: &SubmissionId, tenant_id: Option<&str>) -> ManagerResult<SubmissionView> {
        let submission = self.load_for_id(submission_id, tenant_id).await?;
        Ok(self.view(&submission, false, true))
    }

    #[instrument(skip(self, actor), fields(submission_id = %submission_id))]
    pub async fn generate_handoff_url(&self, submission_id: &SubmissionId, tenant_id: Option<&str>, actor: Actor) -> ManagerResult<HandoffView> {
        let mut submission = self.load_for_id(submission_id, tenant_id).await?;
        let now = self.clock.now();
        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;
        self.record_event(&mut submission, EventKind::HandoffLinkIssued, actor, serde_json::json!({}), now)
            .await?;
        self.submissions.save(submission.clone()).await?;

        let handoff_url = format!("{}/submissions/resume/{}", self.base_url.trim_end_matches('/'), submission.resume_token);
        Ok(HandoffView {
            submission_id: submission.submission_id.as_str().to_string(),
            resume_token: submission.resume_token.as_str().to_string(),
            handoff_url,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn emit_handoff_resumed(&self, token: &str, actor: Actor) -> ManagerResult<SubmissionView> {
        let mut submission = self
            .submissions
            .get_by_resume_token(token)
            .await?
            .ok_or_else(ManagerError::not_found)?;
        let now = self.clock.now();
        if submission.is_expired(now) {
            return Err(ManagerError::expired());
        }
        self.record_event(&mut submission, EventKind::HandoffResumed, actor, serde_json::json!({}), now)
            .await?;
        submission.updated_at = now;
        self.submissions.save(submission.clone()).await?;
        Ok(self.view(&submission, false, true))
    }
}

fn schema_field_type<'a>(schema: &'a FieldSchema, dot_path: &str) -> Option<&'a formbridge_domain::FieldType> {
    let top_level = dot_path.split('.').next().unwrap_or(dot_path);
    schema.properties.get(top_level).map(|f| &f.field_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_domain::{ApprovalGate, Destination, FieldType, IntakeDefinition};
    use formbridge_ports::{EventFilter, EventStoreError, SubmissionStoreError, SubmissionStoreStats};
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct MemSubmissionStore {
        by_id: Mutex<HashMap<String, Submission>>,
    }

    #[async_trait::async_trait]
    impl SubmissionStore for MemSubmissionStore {
        async fn save(&self, submission: Submission) -> Result<(), SubmissionStoreError> {
            self.by_id.lock().unwrap().insert(submission.submission_id.as_str().to_string(), submission);
            Ok(())
        }
        async fn get_by_id(&self, id: &SubmissionId, tenant_id: Option<&str>) -> Result<Option<Submission>, SubmissionStoreError> {
            let map = self.by_id.lock().unwrap();
            Ok(map.get(id.as_str()).filter(|s| tenant_id.map(|t| t == s.tenant_id).unwrap_or(true)).cloned())
        }
        async fn get_by_resume_token(&self, token: &str) -> Result<Option<Submission>, SubmissionStoreError> {
            Ok(self.by_id.lock().unwrap().values().find(|s| s.resume_token.as_str() == token).cloned())
        }
        async fn get_by_idempotency_key(
            &self,
            tenant_id: Option<&str>,
            intake_id: &str,
            idempotency_key: &str,
        ) -> Result<Option<Submission>, SubmissionStoreError> {
            Ok(self
                .by_id
                .lock()
                .unwrap()
                .values()
                .find(|s| {
                    s.intake_id == intake_id
                        && s.idempotency_key.as_deref() == Some(idempotency_key)
                        && tenant_id.map(|t| t == s.tenant_id).unwrap_or(true)
                })
                .cloned())
        }
        async fn stats(&self) -> Result<SubmissionStoreStats, SubmissionStoreError> {
            Ok(SubmissionStoreStats::default())
        }
        async fn list_expired_non_terminal(&self, _now: DateTime<Utc>) -> Result<Vec<Submission>, SubmissionStoreError> {
            Ok(vec![])
        }
        async fn evict_terminal_over_budget(&self, _max_entries: usize) -> Result<usize, SubmissionStoreError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct MemEventStore {
        events: Mutex<Vec<IntakeEvent>>,
    }

    #[async_trait::async_trait]
    impl EventStore for MemEventStore {
        async fn append(&self, event: IntakeEvent) -> Result<(), EventStoreError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
        async fn list(&self, _submission_id: &SubmissionId, _filter: &EventFilter) -> Result<Vec<IntakeEvent>, EventStoreError> {
            Ok(self.events.lock().unwrap().clone())
        }
        async fn count(&self, _submission_id: &SubmissionId, _filter: &EventFilter) -> Result<usize, EventStoreError> {
            Ok(self.events.lock().unwrap().len())
        }
    }

    struct NullEmitter;
    #[async_trait::async_trait]
    impl EventEmitter for NullEmitter {
        async fn emit(&self, _event: &IntakeEvent) {}
    }

    fn empty_schema(field_type: FieldType) -> FieldSchema {
        FieldSchema {
            field_type,
            format: None,
            pattern: None,
            r#enum: vec![],
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            properties: HashMap::new(),
            required: vec![],
            items: None,
            max_size: None,
            allowed_types: vec![],
            max_count: None,
            hint: None,
        }
    }

    fn vendor_intake(approval_gates: Vec<ApprovalGate>) -> IntakeDefinition {
        let mut properties = HashMap::new();
        properties.insert("legal_name".to_string(), empty_schema(FieldType::String));
        properties.insert("annual_revenue".to_string(), empty_schema(FieldType::Number));
        IntakeDefinition {
            id: "vendor_onboarding".to_string(),
            version: "1.0.0".to_string(),
            schema: FieldSchema {
                properties,
                required: vec!["legal_name".to_string()],
                ..empty_schema(FieldType::Object)
            },
            destination: Destination {
                url: "https://example.com/hook".to_string(),
                headers: HashMap::new(),
            },
            approval_gates,
        }
    }

    fn manager(approval_gates: Vec<ApprovalGate>) -> SubmissionManager {
        let intakes = Arc::new(IntakeRegistry::new());
        intakes.register(vendor_intake(approval_gates)).unwrap();
        SubmissionManager::new(
            intakes,
            Arc::new(MemSubmissionStore::default()),
            Arc::new(MemEventStore::default()),
            Arc::new(NullEmitter),
            Arc::new(FixedClock(Utc::now())),
            Duration::days(7),
            "https://formbridge.example.com".to_string(),
        )
    }

    fn human(id: &str) -> Actor {
        Actor {
            kind: formbridge_domain::ActorKind::Human,
            id: id.to_string(),
            name: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn create_with_no_fields_lands_in_draft() {
        let mgr = manager(vec![]);
        let view = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        assert_eq!(view.state, SubmissionState::Draft);
        assert!(view.fields.is_empty());
    }

    #[tokio::test]
    async fn create_with_initial_fields_advances_straight_to_in_progress() {
        let mgr = manager(vec![]);
        let mut fields = HashMap::new();
        fields.insert("legal_name".to_string(), serde_json::json!("Acme Corp"));
        let view = mgr.create("vendor_onboarding", human("u1"), Some(fields), None, None).await.unwrap();
        assert_eq!(view.state, SubmissionState::InProgress);
        assert_eq!(view.fields.get("legal_name").unwrap(), "Acme Corp");
    }

    #[tokio::test]
    async fn idempotent_create_replays_the_same_record() {
        let mgr = manager(vec![]);
        let first = mgr
            .create("vendor_onboarding", human("u1"), None, Some("K-1".to_string()), Some("t1".to_string()))
            .await
            .unwrap();
        let second = mgr
            .create("vendor_onboarding", human("u1"), None, Some("K-1".to_string()), Some("t1".to_string()))
            .await
            .unwrap();
        assert_eq!(first.submission_id, second.submission_id);
        assert_eq!(first.resume_token, second.resume_token);
    }

    #[tokio::test]
    async fn set_fields_rejects_a_stale_token() {
        let mgr = manager(vec![]);
        let created = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        let id = SubmissionId::from_string(created.submission_id.clone());
        let mut fields = HashMap::new();
        fields.insert("legal_name".to_string(), serde_json::json!("Acme"));
        mgr.set_fields(&id, &created.resume_token, None, human("u1"), fields.clone()).await.unwrap();

        let err = mgr.set_fields(&id, &created.resume_token, None, human("u1"), fields).await.unwrap_err();
        assert_eq!(err.kind, formbridge_domain::ErrorKind::InvalidResumeToken);
    }

    #[tokio::test]
    async fn set_fields_rejects_reserved_field_names() {
        let mgr = manager(vec![]);
        let created = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        let id = SubmissionId::from_string(created.submission_id.clone());
        let mut fields = HashMap::new();
        fields.insert("__proto__".to_string(), serde_json::json!(1));
        let err = mgr.set_fields(&id, &created.resume_token, None, human("u1"), fields).await.unwrap_err();
        assert_eq!(err.kind, formbridge_domain::ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn submit_without_matching_gate_goes_straight_to_submitted() {
        let mgr = manager(vec![ApprovalGate {
            id: "high_revenue".to_string(),
            condition: "annual_revenue > 1000000".to_string(),
            required: true,
        }]);
        let created = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        let id = SubmissionId::from_string(created.submission_id.clone());
        let mut fields = HashMap::new();
        fields.insert("legal_name".to_string(), serde_json::json!("Acme"));
        fields.insert("annual_revenue".to_string(), serde_json::json!(500_000));
        let after_fields = mgr.set_fields(&id, &created.resume_token, None, human("u1"), fields).await.unwrap();

        let submitted = mgr.submit(&id, &after_fields.resume_token, None, human("u1")).await.unwrap();
        assert_eq!(submitted.state, SubmissionState::Submitted);
        assert!(!submitted.needs_approval);
    }

    #[tokio::test]
    async fn submit_with_matching_gate_routes_to_needs_review() {
        let mgr = manager(vec![ApprovalGate {
            id: "high_revenue".to_string(),
            condition: "annual_revenue > 1000000".to_string(),
            required: true,
        }]);
        let created = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        let id = SubmissionId::from_string(created.submission_id.clone());
        let mut fields = HashMap::new();
        fields.insert("legal_name".to_string(), serde_json::json!("Acme"));
        fields.insert("annual_revenue".to_string(), serde_json::json!(1_500_000));
        let after_fields = mgr.set_fields(&id, &created.resume_token, None, human("u1"), fields).await.unwrap();

        let submitted = mgr.submit(&id, &after_fields.resume_token, None, human("u1")).await.unwrap();
        assert_eq!(submitted.state, SubmissionState::NeedsReview);
        assert!(submitted.needs_approval);
    }

    #[tokio::test]
    async fn get_by_resume_token_reports_expired_links() {
        let intakes = Arc::new(IntakeRegistry::new());
        intakes.register(vendor_intake(vec![])).unwrap();
        let mgr = SubmissionManager::new(
            intakes,
            Arc::new(MemSubmissionStore::default()),
            Arc::new(MemEventStore::default()),
            Arc::new(NullEmitter),
            Arc::new(FixedClock(Utc::now())),
            Duration::seconds(-1),
            "https://formbridge.example.com".to_string(),
        );
        let created = mgr.create("vendor_onboarding", human("u1"), None, None, None).await.unwrap();
        let err = mgr.get_by_resume_token(&created.resume_token).await.unwrap_err();
        assert_eq!(err.kind, formbridge_domain::ErrorKind::Expired);
    }
}
