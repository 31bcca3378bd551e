//! Minimal actor/tenant extraction from request headers.
//!
//! Authentication, rate limiting, and multi-tenant scoping are explicitly
//! out of scope for the core (§1): "treated as filters that precede the
//! core." This module is that filter's thinnest possible stand-in — it
//! reads an already-authenticated caller's identity off headers a real
//! auth layer would set, so the core's actor-attribution and tenant-scope
//! invariants have something to consume.

use axum::http::HeaderMap;

use formbridge_domain::{Actor, ActorKind};
use formbridge_manager::ManagerError;

use crate::handlers::error::ApiError;

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ApiError::from(invalid_request("missing X-Actor-Id header")))?;

    let kind = match headers.get("x-actor-kind").and_then(|v| v.to_str().ok()) {
        Some("human") => ActorKind::Human,
        Some("system") => ActorKind::System,
        Some("agent") | None => ActorKind::Agent,
        Some(other) => return Err(ApiError::from(invalid_request(format!("unrecognized actor kind {other}")))),
    };

    let name = headers.get("x-actor-name").and_then(|v| v.to_str().ok()).map(str::to_string);

    Ok(Actor {
        kind,
        id,
        name,
        metadata: None,
    })
}

pub fn tenant_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get("x-tenant-id").and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn invalid_request(message: impl Into<String>) -> ManagerError {
    ManagerError::with_message(formbridge_domain::ErrorKind::InvalidRequest, message)
}
