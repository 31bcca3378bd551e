//! The paginated, filterable per-submission event stream per §4.D/§6.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use formbridge_domain::{ActorKind, EventKind, IntakeEvent, SubmissionId};
use formbridge_ports::EventFilter;

use crate::extract::tenant_from_headers;
use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated `EventKind`s in snake_case, e.g. `field_updated,submission_submitted`.
    #[serde(default)]
    pub kinds: Option<String>,
    #[serde(default)]
    pub actor_kind: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<IntakeEvent>,
    pub total: usize,
}

fn parse_kind(raw: &str) -> Option<EventKind> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
}

fn parse_actor_kind(raw: &str) -> Option<ActorKind> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
}

impl TryFrom<EventsQuery> for EventFilter {
    type Error = ApiError;

    fn try_from(q: EventsQuery) -> Result<Self, Self::Error> {
        let kinds = match q.kinds {
            Some(raw) => {
                let parsed: Vec<EventKind> = raw.split(',').filter(|s| !s.is_empty()).filter_map(parse_kind).collect();
                Some(parsed)
            }
            None => None,
        };
        let actor_kind = q.actor_kind.as_deref().and_then(parse_actor_kind);

        Ok(EventFilter {
            kinds,
            actor_kind,
            since: q.since,
            until: q.until,
            limit: q.limit,
            offset: q.offset,
        })
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let tenant_id = tenant_from_headers(&headers);
    let id = SubmissionId::from_string(submission_id);

    state
        .submissions
        .get_by_id(&id, tenant_id.as_deref())
        .await
        .map_err(|e| ApiError::from(formbridge_manager::ManagerError::from(e)))?
        .ok_or_else(|| ApiError::from(formbridge_manager::ManagerError::not_found()))?;

    let filter: EventFilter = query.try_into()?;

    let events = state
        .events
        .list(&id, &filter)
        .await
        .map_err(|e| ApiError::from(formbridge_manager::ManagerError::from(e)))?;
    let total = state
        .events
        .count(&id, &filter)
        .await
        .map_err(|e| ApiError::from(formbridge_manager::ManagerError::from(e)))?;

    Ok(Json(EventsResponse { events, total }))
}
