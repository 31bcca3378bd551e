//! Kicks off the actual HTTP webhook delivery after a submission lands in
//! `submitted` or `approved`. `formbridge-manager` only transitions state
//! through the pure ports (§4.G, §4.H) — it cannot depend on
//! `formbridge-adapters` for the HTTP client without an import cycle, since
//! the adapters crate already depends on the manager crate for the webhook
//! payload/signing helpers. The app layer is the seam where both sides
//! meet, so it is the one that mints the single `DeliveryRecord` for this
//! submit/approve (via `WebhookEngine::enqueue_delivery`) and writes its id
//! back onto the submission — there is exactly one delivery record per
//! dispatch, never a manager-side one plus an engine-side one.
use formbridge_domain::{SubmissionId, SubmissionState};

use crate::state::AppState;

/// Look up the submission and its intake's destination and, if the
/// submission is in a state that should have a delivery in flight, enqueue
/// it on the webhook engine. Failures are logged, never surfaced to the
/// caller — the webhook engine's own retry scheduler is the backstop.
pub async fn dispatch_if_pending(state: &AppState, submission_id: &SubmissionId, tenant_id: Option<&str>) {
    let mut submission = match state.submissions.get_by_id(submission_id, tenant_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "could not reload submission to dispatch delivery");
            return;
        }
    };

    if !matches!(submission.state, SubmissionState::Submitted | SubmissionState::Approved) {
        return;
    }

    let Some(intake) = state.intakes.get(&submission.intake_id) else {
        tracing::warn!(intake_id = %submission.intake_id, "intake vanished between submit and delivery dispatch");
        return;
    };

    let delivery_id = state.webhook_engine.enqueue_delivery(submission.clone(), intake.destination);
    tracing::debug!(%delivery_id, "webhook delivery enqueued");

    submission.delivery_id = Some(delivery_id);
    if let Err(e) = state.submissions.save(submission).await {
        tracing::warn!(error = %e, "failed to persist delivery id onto submission");
    }
}
