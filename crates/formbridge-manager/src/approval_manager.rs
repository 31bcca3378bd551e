//! The approval manager per §4.H — reviewer decisions that gate a
//! submission's exit from `needs_review`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use formbridge_domain::{
    Actor, DeliveryRecord, EventKind, IntakeRegistry, ResumeToken, Submission, SubmissionId,
    SubmissionStateMachine, SubmissionTransition,
};
use formbridge_ports::{Clock, DeliveryQueue, EventEmitter, EventStore, SubmissionStore};

use crate::errors::{ManagerError, ManagerResult};
use crate::submission_manager::SubmissionView;

pub struct ApprovalManager {
    intakes: Arc<IntakeRegistry>,
    submissions: Arc<dyn SubmissionStore>,
    events: Arc<dyn EventStore>,
    emitter: Arc<dyn EventEmitter>,
    delivery: Arc<dyn DeliveryQueue>,
    clock: Arc<dyn Clock>,
}

impl ApprovalManager {
    pub fn new(
        intakes: Arc<IntakeRegistry>,
        submissions: Arc<dyn SubmissionStore>,
        events: Arc<dyn EventStore>,
        emitter: Arc<dyn EventEmitter>,
        delivery: Arc<dyn DeliveryQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            intakes,
            submissions,
            events,
            emitter,
            delivery,
            clock,
        }
    }

    /// Common pre-flight per §4.H: load, tenant-scope, constant-time token
    /// compare, and require the submission to currently be `needs_review`.
    async fn preflight(
        &self,
        submission_id: &SubmissionId,
        tenant_id: Option<&str>,
        resume_token: &str,
    ) -> ManagerResult<Submission> {
        let submission = self
            .submissions
            .get_by_id(submission_id, tenant_id)
            .await?
            .ok_or_else(ManagerError::not_found)?;
        if !submission.token_matches(resume_token) {
            return Err(ManagerError::invalid_resume_token());
        }
        if submission.state != formbridge_domain::SubmissionState::NeedsReview {
            return Err(ManagerError::conflict(format!(
                "submission is {:?}, not needs_review",
                submission.state
            )));
        }
        Ok(submission)
    }

    async fn record_event(
        &self,
        submission: &mut Submission,
        kind: EventKind,
        actor: Actor,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> ManagerResult<()> {
        let version = submission.version + 1;
        let event = formbridge_domain::IntakeEvent::new(
            kind,
            submission.submission_id.clone(),
            actor,
            submission.state,
            payload,
            version,
            now,
        );
        submission.version = version;
        submission.events.push(event.clone());
        self.events.append(event.clone()).await?;
        self.emitter.emit(&event).await;
        Ok(())
    }

    fn view(&self, submission: &Submission) -> SubmissionView {
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
            schema: None,
            needs_approval: false,
        }
    }

    /// Enqueue a reviewer-notification delivery through the same delivery
    /// queue used for the destination webhook — the core names no separate
    /// transport for reviewer notifications (§4.H).
    async fn notify_reviewer(&self, submission: &Submission, reason: &str) -> ManagerResult<()> {
        let Some(intake) = self.intakes.get(&submission.intake_id) else {
            return Ok(());
        };
        let now = self.clock.now();
        let mut record = DeliveryRecord::pending(submission.submission_id.clone(), intake.destination.url.clone(), now);
        record.error = Some(reason.to_string());
        self.delivery.enqueue(record).await?;
        Ok(())
    }

    pub async fn approve(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.preflight(submission_id, tenant_id, resume_token).await?;
        let now = self.clock.now();

        submission.state = SubmissionStateMachine::transition(Some(submission.state), SubmissionTransition::Approve)?;
        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;
        self.record_event(&mut submission, EventKind::ReviewApproved, actor, serde_json::json!({}), now)
            .await?;
        self.submissions.save(submission.clone()).await?;

        // Delivery dispatch happens at the app seam (see formbridge-api's
        // `delivery::dispatch_if_pending`), which mints the one true
        // `DeliveryRecord` and writes its id back onto the submission.
        Ok(self.view(&submission))
    }

    pub async fn reject(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
        reason: Option<String>,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.preflight(submission_id, tenant_id, resume_token).await?;
        let now = self.clock.now();

        submission.state = SubmissionStateMachine::transition(Some(submission.state), SubmissionTransition::Reject)?;
        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;
        self.record_event(
            &mut submission,
            EventKind::ReviewRejected,
            actor,
            serde_json::json!({ "reason": reason }),
            now,
        )
        .await?;
        self.submissions.save(submission.clone()).await?;
        self.notify_reviewer(&submission, reason.as_deref().unwrap_or("rejected")).await?;

        Ok(self.view(&submission))
    }

    pub async fn request_changes(
        &self,
        submission_id: &SubmissionId,
        resume_token: &str,
        tenant_id: Option<&str>,
        actor: Actor,
        reason: Option<String>,
    ) -> ManagerResult<SubmissionView> {
        let mut submission = self.preflight(submission_id, tenant_id, resume_token).await?;
        let now = self.clock.now();

        submission.state = SubmissionStateMachine::transition(Some(submission.state), SubmissionTransition::RequestChanges)?;
        submission.resume_token = ResumeToken::new();
        submission.updated_at = now;
        self.record_event(
            &mut submission,
            EventKind::ReviewChangesRequested,
            actor,
            serde_json::json!({ "reason": reason }),
            now,
        )
        .await?;
        self.submissions.save(submission.clone()).await?;
        self.notify_reviewer(&submission, reason.as_deref().unwrap_or("changes requested")).await?;

        Ok(self.view(&submission))
    }
}
