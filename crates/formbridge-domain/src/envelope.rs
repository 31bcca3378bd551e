//! Error taxonomy and the two carrier shapes per §4.L, §7, §9.
//!
//! HTTP-boundary callers want `ErrorEnvelope`; tool-protocol callers want
//! `FlatError`. Both are built from the same [`ErrorKind`] so the status
//! code / retryability / next-actions logic lives in exactly one place.

use serde::{Deserialize, Serialize};

use crate::validator::FieldError;

/// Discriminated error kind per §4.L.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    InvalidResumeToken,
    Invalid,
    Conflict,
    NeedsApproval,
    Expired,
    Unauthorized,
    Forbidden,
    RateLimited,
    StorageError,
    InternalError,
}

impl ErrorKind {
    /// The HTTP status this kind maps to per §7.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Invalid | ErrorKind::InvalidRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidResumeToken | ErrorKind::Conflict => 409,
            ErrorKind::Expired => 410,
            ErrorKind::RateLimited => 429,
            ErrorKind::NeedsApproval => 200,
            ErrorKind::StorageError | ErrorKind::InternalError => 500,
        }
    }

    /// Whether a caller should expect a retry to eventually succeed.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::StorageError | ErrorKind::InternalError
        )
    }
}

/// A recovery suggestion attached to every error per §7 — `nextActions`
/// must suggest at least one concrete recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
}

impl NextAction {
    pub fn new(action_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            description: description.into(),
        }
    }
}

/// A field-path-scoped error attached to an envelope/flat error, shared by
/// both carrier shapes per §4.L ("Both carry `fields: [...]`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorField {
    pub field: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&FieldError> for ErrorField {
    fn from(e: &FieldError) -> Self {
        Self {
            field: e.field.clone(),
            message: e.message.clone(),
            kind: format!("{:?}", e.code).to_lowercase(),
        }
    }
}

/// The shared error payload both carrier shapes wrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ErrorField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<NextAction>,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// HTTP/API boundary error carrier per §4.L.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    pub error: ErrorDetail,
}

/// Tool-protocol boundary error carrier per §4.L.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ErrorField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<NextAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// Builder gathering the pieces common to both carrier shapes.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    kind: ErrorKind,
    message: Option<String>,
    fields: Vec<ErrorField>,
    next_actions: Vec<NextAction>,
    retry_after_ms: Option<u64>,
}

impl ErrorBuilder {
    pub fn new(kind: ErrorKind) -> Self {
        let mut builder = Self {
            kind,
            message: None,
            fields: Vec::new(),
            next_actions: Vec::new(),
            retry_after_ms: None,
        };
        // Every error gets a default recovery suggestion per §7; callers can
        // override with `.action(...)` before the default would otherwise ship.
        builder.next_actions.push(default_next_action(kind));
        builder
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn field_errors(mut self, errors: &[FieldError]) -> Self {
        self.fields = errors.iter().map(ErrorField::from).collect();
        self
    }

    /// Replace the default next-action with a caller-supplied, more specific
    /// one (e.g. "use a valid field name from the intake schema").
    pub fn action(mut self, action_type: impl Into<String>, description: impl Into<String>) -> Self {
        self.next_actions = vec![NextAction::new(action_type, description)];
        self
    }

    pub fn retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind,
            message: self.message.clone(),
            fields: self.fields.clone(),
            next_actions: self.next_actions.clone(),
            retryable: self.kind.retryable(),
            retry_after_ms: self.retry_after_ms,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            submission_id: None,
            state: None,
            resume_token: None,
            error: self.detail(),
        }
    }

    pub fn envelope_for(&self, submission_id: impl Into<String>, state: impl Into<String>) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            submission_id: Some(submission_id.into()),
            state: Some(state.into()),
            resume_token: None,
            error: self.detail(),
        }
    }

    pub fn flat(&self) -> FlatError {
        FlatError {
            kind: self.kind,
            message: self.message.clone().unwrap_or_else(|| default_message(self.kind)),
            fields: self.fields.clone(),
            next_actions: self.next_actions.clone(),
            timestamp: Some(chrono::Utc::now()),
        }
    }
}

fn default_message(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::NotFound => "resource not found".to_string(),
        ErrorKind::InvalidRequest => "invalid request".to_string(),
        ErrorKind::InvalidResumeToken => "resume token is invalid or stale".to_string(),
        ErrorKind::Invalid => "validation failed".to_string(),
        ErrorKind::Conflict => "the operation conflicts with current state".to_string(),
        ErrorKind::NeedsApproval => "submission routed to review".to_string(),
        ErrorKind::Expired => "this resume link has expired".to_string(),
        ErrorKind::Unauthorized => "authentication is required".to_string(),
        ErrorKind::Forbidden => "not permitted".to_string(),
        ErrorKind::RateLimited => "rate limit exceeded".to_string(),
        ErrorKind::StorageError => "storage backend error".to_string(),
        ErrorKind::InternalError => "internal error".to_string(),
    }
}

fn default_next_action(kind: ErrorKind) -> NextAction {
    match kind {
        ErrorKind::NotFound => NextAction::new("create", "Create a new submission"),
        ErrorKind::Expired => NextAction::new("create", "Create a new submission"),
        ErrorKind::InvalidResumeToken => {
            NextAction::new("handoff", "Request a fresh handoff link for this submission")
        }
        ErrorKind::Invalid => NextAction::new("validate", "Use a valid field name from the intake schema"),
        ErrorKind::Conflict => NextAction::new("get", "Reload the submission and retry"),
        ErrorKind::NeedsApproval => NextAction::new("wait", "Wait for a reviewer decision"),
        ErrorKind::Unauthorized => NextAction::new("authenticate", "Provide valid credentials"),
        ErrorKind::Forbidden => NextAction::new("contact_support", "Contact the tenant administrator"),
        ErrorKind::RateLimited => NextAction::new("retry", "Retry after the given delay"),
        ErrorKind::StorageError | ErrorKind::InternalError => {
            NextAction::new("retry", "Retry the request")
        }
        ErrorKind::InvalidRequest => NextAction::new("fix_request", "Correct the request shape and retry"),
    }
}

/// Discriminate a deserialized HTTP response body without a full schema —
/// mirrors the source's "discriminated union with predicates" design per §9.
pub fn is_envelope_error(value: &serde_json::Value) -> bool {
    matches!(value.get("ok"), Some(serde_json::Value::Bool(false)))
}

/// Discriminate a deserialized tool-protocol response body.
pub fn is_flat_error(value: &serde_json::Value) -> bool {
    value.get("type").and_then(|v| v.as_str()).is_some() && value.get("ok").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_kind_carries_at_least_one_next_action() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::InvalidRequest,
            ErrorKind::InvalidResumeToken,
            ErrorKind::Invalid,
            ErrorKind::Conflict,
            ErrorKind::NeedsApproval,
            ErrorKind::Expired,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::RateLimited,
            ErrorKind::StorageError,
            ErrorKind::InternalError,
        ] {
            let envelope = ErrorBuilder::new(kind).envelope();
            assert!(!envelope.error.next_actions.is_empty());
        }
    }

    #[test]
    fn expired_error_maps_to_410_and_suggests_create() {
        assert_eq!(ErrorKind::Expired.status_code(), 410);
        let envelope = ErrorBuilder::new(ErrorKind::Expired).envelope();
        assert_eq!(envelope.error.next_actions[0].action_type, "create");
    }

    #[test]
    fn invalid_resume_token_is_409_not_403() {
        assert_eq!(ErrorKind::InvalidResumeToken.status_code(), 409);
    }

    #[test]
    fn is_envelope_and_is_flat_are_mutually_exclusive() {
        let envelope = serde_json::to_value(ErrorBuilder::new(ErrorKind::NotFound).envelope()).unwrap();
        let flat = serde_json::to_value(ErrorBuilder::new(ErrorKind::NotFound).flat()).unwrap();
        assert!(is_envelope_error(&envelope));
        assert!(!is_flat_error(&envelope));
        assert!(is_flat_error(&flat));
        assert!(!is_envelope_error(&flat));
    }

    #[test]
    fn retryable_flags_match_the_retry_worthy_kinds() {
        assert!(ErrorKind::InternalError.retryable());
        assert!(ErrorKind::RateLimited.retryable());
        assert!(!ErrorKind::NotFound.retryable());
        assert!(!ErrorKind::Invalid.retryable());
    }
}
