//! Maps a [`ManagerError`] to the HTTP-boundary carrier shape per §4.L:
//! `{ ok: false, error: {...} }` at the status code §7 assigns to its
//! [`ErrorKind`].

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};

use formbridge_domain::envelope::ErrorEnvelope;
use formbridge_manager::ManagerError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Thin wrapper so `ManagerError` can implement `IntoResponse` without
/// `formbridge-manager` taking an axum dependency.
pub struct ApiError(pub ManagerError);

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope: ErrorEnvelope = self.0.into_envelope();
        let status = StatusCode::from_u16(envelope.error.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}
