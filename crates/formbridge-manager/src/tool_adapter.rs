//! Tool-surface adapter per §4.M: exposes every registered intake as six
//! named operations, `{intakeId}_{op}` for `op` in `create`, `set`,
//! `validate`, `submit`, `requestUpload`, `confirmUpload`.
//!
//! This is deliberately thin — input-shape validation, routing to the
//! submission manager or upload negotiator, and serializing the result.
//! All lifecycle logic lives in [`crate::submission_manager`] and
//! [`crate::upload_negotiator`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use formbridge_domain::{Actor, ActorKind, ErrorKind, FlatError, SubmissionId, UploadId};

use crate::errors::ManagerError;
use crate::submission_manager::SubmissionManager;
use crate::upload_negotiator::UploadNegotiator;

const OPERATIONS: &[&str] = &["create", "set", "validate", "submit", "requestUpload", "confirmUpload"];

pub struct ToolSurfaceAdapter {
    submissions: Arc<SubmissionManager>,
    uploads: Arc<UploadNegotiator>,
}

#[derive(Debug, Deserialize)]
struct ActorArg {
    kind: Option<String>,
    id: String,
    name: Option<String>,
}

impl ActorArg {
    fn into_actor(self) -> Actor {
        let kind = match self.kind.as_deref() {
            Some("human") => ActorKind::Human,
            Some("system") => ActorKind::System,
            _ => ActorKind::Agent,
        };
        Actor {
            kind,
            id: self.id,
            name: self.name,
            metadata: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    actor: ActorArg,
    #[serde(default)]
    fields: Option<HashMap<String, Value>>,
    #[serde(default)]
    idempotency_key: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetArgs {
    submission_id: String,
    resume_token: String,
    actor: ActorArg,
    fields: HashMap<String, Value>,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmissionScopedArgs {
    submission_id: String,
    resume_token: String,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitArgs {
    submission_id: String,
    resume_token: String,
    actor: ActorArg,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestUploadArgs {
    submission_id: String,
    resume_token: String,
    actor: ActorArg,
    field: String,
    filename: String,
    mime_type: String,
    size_bytes: u64,
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmUploadArgs {
    submission_id: String,
    resume_token: String,
    actor: ActorArg,
    upload_id: String,
    #[serde(default)]
    tenant_id: Option<String>,
}

impl ToolSurfaceAdapter {
    pub fn new(submissions: Arc<SubmissionManager>, uploads: Arc<UploadNegotiator>) -> Self {
        Self { submissions, uploads }
    }

    /// Split `operation_name` on the last underscore; the suffix must name
    /// one of the six operations. Returns `(intake_id, operation)`.
    fn parse_operation(operation_name: &str) -> Result<(&str, &str), FlatError> {
        let (intake_id, op) = operation_name
            .rsplit_once('_')
            .ok_or_else(|| invalid_request(format!("{operation_name} does not name an intake and operation")).into_flat())?;
        if !OPERATIONS.contains(&op) {
            return Err(invalid_request(format!("{op} is not a recognized operation")).into_flat());
        }
        if intake_id.is_empty() {
            return Err(invalid_request("missing intake id").into_flat());
        }
        Ok((intake_id, op))
    }

    fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, FlatError> {
        serde_json::from_value(args).map_err(|e| invalid_request(format!("malformed arguments: {e}")).into_flat())
    }

    pub async fn dispatch(&self, operation_name: &str, args: Value) -> Result<Value, FlatError> {
        let (intake_id, op) = Self::parse_operation(operation_name)?;

        match op {
            "create" => {
                let args: CreateArgs = Self::parse_args(args)?;
                self.submissions
                    .create(intake_id, args.actor.into_actor(), args.fields, args.idempotency_key, args.tenant_id)
                    .await
                    .map(|view| serde_json::to_value(view).expect("submission view is always serializable"))
                    .map_err(|e| e.into_flat())
            }
            "set" => {
                let args: SetArgs = Self::parse_args(args)?;
                let id = SubmissionId::from_string(args.submission_id);
                self.submissions
                    .set_fields(&id, &args.resume_token, args.tenant_id.as_deref(), args.actor.into_actor(), args.fields)
                    .await
                    .map(|view| serde_json::to_value(view).expect("submission view is always serializable"))
                    .map_err(|e| e.into_flat())
            }
            "validate" => {
                let args: SubmissionScopedArgs = Self::parse_args(args)?;
                let id = SubmissionId::from_string(args.submission_id);
                self.submissions
                    .validate(&id, &args.resume_token, args.tenant_id.as_deref())
                    .await
                    .map(|view| serde_json::to_value(view).expect("submission view is always serializable"))
                    .map_err(|e| e.into_flat())
            }
            "submit" => {
                let args: SubmitArgs = Self::parse_args(args)?;
                let id = SubmissionId::from_string(args.submission_id);
                self.submissions
                    .submit(&id, &args.resume_token, args.tenant_id.as_deref(), args.actor.into_actor())
                    .await
                    .map(|view| serde_json::to_value(view).expect("submission view is always serializable"))
                    .map_err(|e| e.into_flat())
            }
            "requestUpload" => {
                let args: RequestUploadArgs = Self::parse_args(args)?;
                let id = SubmissionId::from_string(args.submission_id);
                self.uploads
                    .request_upload(
                        &id,
                        &args.resume_token,
                        args.tenant_id.as_deref(),
                        args.actor.into_actor(),
                        &args.field,
                        &args.filename,
                        &args.mime_type,
                        args.size_bytes,
                    )
                    .await
                    .map(|view| serde_json::to_value(view).expect("upload url view is always serializable"))
                    .map_err(|e| e.into_flat())
            }
            "confirmUpload" => {
                let args: ConfirmUploadArgs = Self::parse_args(args)?;
                let submission_id = SubmissionId::from_string(args.submission_id);
                let upload_id = UploadId::from_string(args.upload_id);
                self.uploads
                    .confirm_upload(&submission_id, &args.resume_token, args.tenant_id.as_deref(), args.actor.into_actor(), &upload_id)
                    .await
                    .map(|_| serde_json::json!({ "confirmed": true }))
                    .map_err(|e| e.into_flat())
            }
            _ => unreachable!("operation already validated against OPERATIONS"),
        }
    }
}

fn invalid_request(message: impl Into<String>) -> ManagerError {
    ManagerError::with_message(ErrorKind::InvalidRequest, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use formbridge_domain::{Destination, FieldSchema, FieldType, IntakeDefinition, IntakeRegistry};
    use formbridge_ports::{
        Clock, DeliveryQueue, DeliveryQueueError, DeliveryQueueStats, DeliveryRecord, DeliveryUpdate, EventEmitter, EventFilter, EventStore,
        EventStoreError, SubmissionStore, SubmissionStoreError, SubmissionStoreStats,
    };
    use std::sync::Mutex;

    struct FixedClock(chrono::DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct MemSubmissionStore {
        by_id: Mutex<HashMap<String, formbridge_domain::Submission>>,
    }

    #[async_trait::async_trait]
    impl SubmissionStore for MemSubmissionStore {
        async fn save(&self, submission: formbridge_domain::Submission) -> Result<(), SubmissionStoreError> {
            self.by_id.lock().unwrap().insert(submission.submission_id.as_str().to_string(), submission);
            Ok(())
        }
        async fn get_by_id(&self, id: &SubmissionId, tenant_id: Option<&str>) -> Result<Option<formbridge_domain::Submission>, SubmissionStoreError> {
            let map = self.by_id.lock().unwrap();
            Ok(map.get(id.as_str()).filter(|s| tenant_id.map(|t| t == s.tenant_id).unwrap_or(true)).cloned())
        }
        async fn get_by_resume_token(&self, token: &str) -> Result<Option<formbridge_domain::Submission>, SubmissionStoreError> {
            Ok(self.by_id.lock().unwrap().values().find(|s| s.resume_token.as_str() == token).cloned())
        }
        async fn get_by_idempotency_key(
            &self,
            _tenant_id: Option<&str>,
            _intake_id: &str,
            _idempotency_key: &str,
        ) -> Result<Option<formbridge_domain::Submission>, SubmissionStoreError> {
            Ok(None)
        }
        async fn stats(&self) -> Result<SubmissionStoreStats, SubmissionStoreError> {
            Ok(SubmissionStoreStats::default())
        }
        async fn list_expired_non_terminal(&self, _now: chrono::DateTime<Utc>) -> Result<Vec<formbridge_domain::Submission>, SubmissionStoreError> {
            Ok(vec![])
        }
        async fn evict_terminal_over_budget(&self, _max_entries: usize) -> Result<usize, SubmissionStoreError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct MemEventStore {
        events: Mutex<Vec<formbridge_domain::IntakeEvent>>,
    }

    #[async_trait::async_trait]
    impl EventStore for MemEventStore {
        async fn append(&self, event: formbridge_domain::IntakeEvent) -> Result<(), EventStoreError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
        async fn list(&self, _submission_id: &SubmissionId, _filter: &EventFilter) -> Result<Vec<formbridge_domain::IntakeEvent>, EventStoreError> {
            Ok(vec![])
        }
        async fn count(&self, _submission_id: &SubmissionId, _filter: &EventFilter) -> Result<usize, EventStoreError> {
            Ok(0)
        }
    }

    struct NullEmitter;
    #[async_trait::async_trait]
    impl EventEmitter for NullEmitter {
        async fn emit(&self, _event: &formbridge_domain::IntakeEvent) {}
    }

    #[derive(Default)]
    struct MemDeliveryQueue;

    #[async_trait::async_trait]
    impl DeliveryQueue for MemDeliveryQueue {
        async fn enqueue(&self, record: DeliveryRecord) -> Result<formbridge_domain::DeliveryId, DeliveryQueueError> {
            Ok(record.delivery_id)
        }
        async fn get(&self, _id: &formbridge_domain::DeliveryId) -> Result<Option<DeliveryRecord>, DeliveryQueueError> {
            Ok(None)
        }
        async fn get_by_submission(&self, _submission_id: &SubmissionId) -> Result<Vec<DeliveryRecord>, DeliveryQueueError> {
            Ok(vec![])
        }
        async fn update(&self, _id: &formbridge_domain::DeliveryId, _updater: DeliveryUpdate) -> Result<(), DeliveryQueueError> {
            Ok(())
        }
        async fn get_pending_retries(&self, _now: chrono::DateTime<Utc>) -> Result<Vec<DeliveryRecord>, DeliveryQueueError> {
            Ok(vec![])
        }
        async fn stats(&self) -> Result<DeliveryQueueStats, DeliveryQueueError> {
            Ok(DeliveryQueueStats::default())
        }
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

    fn adapter() -> ToolSurfaceAdapter {
        let intakes = Arc::new(IntakeRegistry::new());
        let mut properties = HashMap::new();
        properties.insert("legal_name".to_string(), empty_schema(FieldType::String));
        intakes
            .register(IntakeDefinition {
                id: "vendor_onboarding".to_string(),
                version: "1.0.0".to_string(),
                schema: FieldSchema {
                    properties,
                    ..empty_schema(FieldType::Object)
                },
                destination: Destination {
                    url: "https://example.com/hook".to_string(),
                    headers: HashMap::new(),
                },
                approval_gates: vec![],
            })
            .unwrap();

        let submissions = Arc::new(MemSubmissionStore::default());
        let events = Arc::new(MemEventStore::default());
        let emitter = Arc::new(NullEmitter);
        let clock = Arc::new(FixedClock(Utc::now()));

        let manager = Arc::new(SubmissionManager::new(
            intakes.clone(),
            submissions.clone(),
            events.clone(),
            emitter.clone(),
            Arc::new(MemDeliveryQueue),
            clock.clone(),
            Duration::days(7),
            "https://formbridge.example.com".to_string(),
        ));
        let negotiator = Arc::new(UploadNegotiator::new(intakes, submissions, events, emitter, None, clock));
        ToolSurfaceAdapter::new(manager, negotiator)
    }

    #[tokio::test]
    async fn unrecognized_operation_suffix_is_a_flat_invalid_request() {
        let adapter = adapter();
        let err = adapter
            .dispatch("vendor_onboarding_delete", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn operation_name_with_no_underscore_is_rejected() {
        let adapter = adapter();
        let err = adapter.dispatch("create", serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn create_routes_to_the_submission_manager() {
        let adapter = adapter();
        let result = adapter
            .dispatch(
                "vendor_onboarding_create",
                serde_json::json!({ "actor": { "kind": "human", "id": "u1" } }),
            )
            .await
            .unwrap();
        assert_eq!(result["state"], "draft");
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_as_invalid_request_not_a_panic() {
        let adapter = adapter();
        let err = adapter
            .dispatch("vendor_onboarding_create", serde_json::json!({ "actor": 5 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn unknown_intake_id_surfaces_as_a_manager_not_found_flat_error() {
        let adapter = adapter();
        let err = adapter
            .dispatch("nonexistent_create", serde_json::json!({ "actor": { "kind": "human", "id": "u1" } }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
