//! Upload negotiation per §4.J: request/confirm against a pluggable
//! signed-URL storage backend.

use std::sync::Arc;

use serde::Serialize;

use formbridge_domain::{Actor, EventKind, FieldType, IntakeRegistry, ResumeToken, Submission, SubmissionId, UploadRecord, UploadStatus};
use formbridge_ports::{
    Clock, EventEmitter, EventStore, StorageBackend, SubmissionStore, UploadConstraints, UploadUrlRequest, VerifyStatus,
};

use crate::errors::{ManagerError, ManagerResult};

#[derive(Debug, Clone, Serialize)]
pub struct UploadUrlView {
    pub upload_id: String,
    pub method: String,
    pub url: String,
    pub expires_in_ms: i64,
    pub constraints: UploadConstraintsView,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadConstraintsView {
    pub max_size: Option<u64>,
    pub allowed_types: Vec<String>,
    pub max_count: Option<u32>,
}

pub struct UploadNegotiator {
    intakes: Arc<IntakeRegistry>,
    submissions: Arc<dyn SubmissionStore>,
    events: Arc<dyn EventStore>,
    emitter: Arc<dyn EventEmitter>,
    storage: Option<Arc<dyn StorageBackend>>,
    clock: Arc<dyn Clock>,
}

impl UploadNegotiator {
    pub fn new(
        intakes: Arc<IntakeRegistry>,
        submissions: Arc<dyn SubmissionStore>,
        events: Arc<dyn EventStore>,
        emitter: Arc<dyn EventEmitter>,
        storage: Option<Arc<dyn StorageBackend>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            intakes,
            submissions,
            events,
            emitter,
            storage,
            clock,
        }
    }

    async fn load_and_authorize(&self, submission_id: &SubmissionId, tenant_id: Option<&str>, resume_token: &str) -> ManagerResult<Submission> {
        let submission = self
            .submissions
            .get_by_id(submission_id, tenant_id)
            .await?
            .ok_or_else(ManagerError::not_found)?;
        if !submission.token_matches(resume_token) {
            return Err(ManagerError::invalid_resume_token());
        }
        Ok(submission)
    }

    async fn record_event(&self, submission: &mut Submission, kind: EventKind, actor: Actor, payload: serde_json::Value) -> ManagerResult<()> {
        let now = self.clock.now();
        let version = submission.version + 1;
        let event = formbridge_domain::IntakeEvent::new(kind, submission.submission_id.clone(), actor, submission.state, payload, version, now);
        submission.version = version;
        submission.events.push(event.clone());
        self.events.append(event.clone()).await?;
        self.emitter.emit(&event).await;
        submission.updated_at = now;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn request_upload(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
        field: &str,
        filename: &str,
        mime_type: &str,
        size_bytes: u64,
    ) -> ManagerResult<UploadUrlView> {
        let mut submission = self.load_and_authorize(submission_id, tenant_id, resume_token).await?;
        let intake = self
            .intakes
            .get(&submission.intake_id)
            .ok_or_else(|| ManagerError::internal("intake definition missing for an existing submission"))?;

        let field_schema = intake.field_schema(field);
        match field_schema {
            Some(schema) if schema.field_type == FieldType::File => {}
            Some(_) => {
                return Err(ManagerError::with_message(
                    formbridge_domain::ErrorKind::Invalid,
                    format!("{field} is not declared as a file field"),
                ));
            }
            None => {
                return Err(ManagerError::with_message(formbridge_domain::ErrorKind::Invalid, format!("{field} is not a field on this intake")));
            }
        }

        let Some(storage) = &self.storage else {
            return Err(ManagerError::with_message(formbridge_domain::ErrorKind::Invalid, "no storage backend is configured"));
        };

        let response = storage
            .generate_upload_url(UploadUrlRequest {
                intake_id: submission.intake_id.clone(),
                submission_id: submission.submission_id.as_str().to_string(),
                field_path: field.to_string(),
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                constraints: UploadConstraints {
                    max_size: Some(size_bytes),
                    allowed_types: vec![mime_type.to_string()],
                    max_count: Some(1),
                },
            })
            .await?;

        submission.uploads.insert(
            response.upload_id.as_str().to_string(),
            UploadRecord {
                upload_id: response.upload_id.clone(),
                field: field.to_string(),
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                size_bytes,
                status: UploadStatus::Pending,
                download_url: None,
                uploaded_at: None,
                error: None,
            },
        );
        self.record_event(
            &mut submission,
            EventKind::UploadRequested,
            actor,
            serde_json::json!({ "field": field, "uploadId": response.upload_id.as_str() }),
        )
        .await?;
        submission.resume_token = ResumeToken::new();
        self.submissions.save(submission.clone()).await?;

        let expires_in_ms = (response.expires_at - self.clock.now()).num_milliseconds().max(0);
        Ok(UploadUrlView {
            upload_id: response.upload_id.as_str().to_string(),
            method: response.method,
            url: response.url,
            expires_in_ms,
            constraints: UploadConstraintsView {
                max_size: Some(size_bytes),
                allowed_types: vec![mime_type.to_string()],
                max_count: Some(1),
            },
        })
    }

    pub async fn confirm_upload(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
        upload_id: &formbridge_domain::UploadId,
    ) -> ManagerResult<()> {
        let mut submission = self.load_and_authorize(submission_id, tenant_id, resume_token).await?;
        let Some(storage) = &self.storage else {
            return Err(ManagerError::with_message(formbridge_domain::ErrorKind::Invalid, "no storage backend is configured"));
        };

        let result = storage.verify_upload(upload_id).await?;
        if !submission.uploads.contains_key(upload_id.as_str()) {
            return Err(ManagerError::not_found());
        }
        let field = submission.uploads.get(upload_id.as_str()).unwrap().field.clone();

        match result.status {
            VerifyStatus::Completed => {
                let download_url = storage.generate_download_url(upload_id).await?;
                if let Some(record) = submission.uploads.get_mut(upload_id.as_str()) {
                    record.status = UploadStatus::Completed;
                    record.download_url = download_url;
                    if let Some(file) = &result.file {
                        record.size_bytes = file.size_bytes;
                        record.mime_type = file.mime_type.clone();
                    }
                    record.uploaded_at = Some(self.clock.now());
                }
                self.record_event(
                    &mut submission,
                    EventKind::UploadCompleted,
                    actor,
                    serde_json::json!({ "field": field, "uploadId": upload_id.as_str() }),
                )
                .await?;
            }
            VerifyStatus::Failed => {
                if let Some(record) = submission.uploads.get_mut(upload_id.as_str()) {
                    record.status = UploadStatus::Failed;
                    record.error = result.error.clone();
                }
                self.record_event(
                    &mut submission,
                    EventKind::UploadFailed,
                    actor,
                    serde_json::json!({ "field": field, "uploadId": upload_id.as_str(), "error": result.error }),
                )
                .await?;
            }
            VerifyStatus::Pending => {}
        }

        self.submissions.save(submission).await?;
        Ok(())
    }
}
