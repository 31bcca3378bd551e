//! The resume-token routes per §4.A/§6: no actor-identity header required,
//! since the resume token itself is the credential a handed-off human uses
//! to pick a submission back up.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use formbridge_manager::SubmissionView;

use crate::extract::actor_from_headers;
use crate::handlers::error::ApiResult;
use crate::state::AppState;

pub async fn get(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> ApiResult<Json<SubmissionView>> {
    let view = state.submission_manager.get_by_resume_token(&token).await?;
    Ok(Json(view))
}

/// Emits `handoff.resumed` so the submission's timeline records when a
/// human actually picked up a handed-off link, distinct from merely
/// fetching it via `GET`.
pub async fn resumed(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SubmissionView>> {
    let actor = actor_from_headers(&headers).unwrap_or_else(|_| formbridge_domain::Actor::system("anonymous_resume"));
    let view = state.submission_manager.emit_handoff_resumed(&token, actor).await?;
    Ok(Json(view))
}
