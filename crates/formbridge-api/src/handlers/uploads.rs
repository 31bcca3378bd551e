//! Upload negotiation endpoints per §4.J/§6: request a signed upload URL,
//! then confirm once the caller has pushed bytes to it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use formbridge_domain::{ErrorKind, SubmissionId, UploadId};
use formbridge_manager::{ManagerError, UploadUrlView};

use crate::extract::{actor_from_headers, tenant_from_headers};
use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestUploadRequest {
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

fn resume_token(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get("x-resume-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::from(ManagerError::with_message(ErrorKind::InvalidRequest, "missing X-Resume-Token header")))
}

pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    Path((_intake_id, submission_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<RequestUploadRequest>,
) -> ApiResult<Json<UploadUrlView>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);

    let view = state
        .upload_negotiator
        .request_upload(&id, &token, tenant_id.as_deref(), actor, &body.field, &body.filename, &body.mime_type, body.size_bytes)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(view))
}

pub async fn confirm_upload(
    State(state): State<Arc<AppState>>,
    Path((_intake_id, submission_id, upload_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = actor_from_headers(&headers)?;
    let tenant_id = tenant_from_headers(&headers);
    let token = resume_token(&headers)?;
    let id = SubmissionId::from_string(submission_id);
    let upload_id = UploadId::from_string(upload_id);

    state
        .upload_negotiator
        .confirm_upload(&id, &token, tenant_id.as_deref(), actor, &upload_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
