//! Reviewer decisions per §4.H/§6: approve, reject, request-changes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use formbridge_domain::{ErrorKind, SubmissionId};
use formbridge_manager::{ManagerError, SubmissionView};

use crate::extract::{actor_from_headers, tenant_from_headers};
use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn resume_token(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get("x-resume-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::from(ManagerError::with_message(ErrorKind::InvalidRequest, "missing X-Resume-Token header")))
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);

    let view = state
        .approval_manager
        .approve(&id, &token, tenant_id.as_deref(), actor)
        .await
        .map_err(ApiError::from)?;

    crate::delivery::dispatch_if_pending(&state, &id, tenant_id.as_deref()).await;
    Ok(Json(view))
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);
    let reason = body.map(|Json(b)| b.reason).unwrap_or(None);

    let view = state
        .approval_manager
        .reject(&id, &token, tenant_id.as_deref(), actor, reason)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}

pub async fn request_changes(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);
    let reason = body.map(|Json(b)| b.reason).unwrap_or(None);

    let view = state
        .approval_manager
        .request_changes(&id, &token, tenant_id.as_deref(), actor, reason)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}
