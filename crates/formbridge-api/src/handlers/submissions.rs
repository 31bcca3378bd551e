//! Submission CRUD + lifecycle endpoints per §6's HTTP surface table:
//! create, read, `setFields` (PATCH), submit, and handoff-URL generation.
//! The resume token travels as the `X-Resume-Token` header — the same
//! place a bearer credential would go, matching §4.G's framing of the
//! token as a credential rather than a path/query parameter.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use formbridge_domain::{ErrorKind, SubmissionId};
use formbridge_manager::{ManagerError, SubmissionView};

use crate::extract::{actor_from_headers, tenant_from_headers};
use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    #[serde(default)]
    pub fields: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetFieldsRequest {
    pub fields: HashMap<String, Value>,
}

fn resume_token(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get("x-resume-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::from(ManagerError::with_message(ErrorKind::InvalidRequest, "missing X-Resume-Token header")))
}

/// Guard a path-addressed write against an `intakeId`/submission mismatch:
/// per §6, a submit/setFields call whose path `intakeId` doesn't match the
/// submission's actual intake is a 404, not a silent cross-intake write.
async fn ensure_intake_matches(state: &AppState, intake_id: &str, submission_id: &SubmissionId, tenant_id: Option<&str>) -> ApiResult<()> {
    let view = state.submission_manager.get_by_id(submission_id, tenant_id).await.map_err(ApiError::from)?;
    if view.intake_id != intake_id {
        return Err(ApiError::from(ManagerError::not_found()));
    }
    Ok(())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(intake_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateSubmissionRequest>,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let view = state
        .submission_manager
        .create(&intake_id, actor, body.fields, body.idempotency_key, tenant_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((intake_id, submission_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<SubmissionView>> {
    let tenant_id = tenant_from_headers(&headers);
    let id = SubmissionId::from_string(submission_id);
    let view = state
        .submission_manager
        .get_by_id(&id, tenant_id.as_deref())
        .await
        .map_err(ApiError::from)?;
    if view.intake_id != intake_id {
        return Err(ApiError::from(ManagerError::not_found()));
    }
    Ok(Json(view))
}

pub async fn set_fields(
    State(state): State<Arc<AppState>>,
    Path((intake_id, submission_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<SetFieldsRequest>,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);
    ensure_intake_matches(&state, &intake_id, &id, tenant_id.as_deref()).await?;

    let view = state
        .submission_manager
        .set_fields(&id, &token, tenant_id.as_deref(), actor, body.fields)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path((intake_id, submission_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);
    ensure_intake_matches(&state, &intake_id, &id, tenant_id.as_deref()).await?;

    let view = state
        .submission_manager
        .submit(&id, &token, tenant_id.as_deref(), actor)
        .await
        .map_err(ApiError::from)?;

    crate::delivery::dispatch_if_pending(&state, &id, tenant_id.as_deref()).await;
    Ok(Json(view))
}

pub async fn handoff(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<formbridge_manager::HandoffView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let id = SubmissionId::from_string(submission_id);
    let view = state
        .submission_manager
        .generate_handoff_url(&id, tenant_id.as_deref(), actor)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}
