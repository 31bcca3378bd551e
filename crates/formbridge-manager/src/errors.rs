//! The single error type every manager operation returns.
//!
//! Carries just enough to build either carrier shape from §4.L: an
//! [`ErrorKind`], an optional message, and optional field errors. Callers
//! at the HTTP or tool boundary pick the shape; this type never picks one
//! for them.

use formbridge_domain::envelope::{ErrorBuilder, ErrorEnvelope, ErrorKind, FlatError};
use formbridge_domain::validator::FieldError;
use formbridge_ports::{DeliveryQueueError, EventStoreError, StorageBackendError, SubmissionStoreError};

#[derive(Debug, Clone)]
pub struct ManagerError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub fields: Vec<FieldError>,
}

impl ManagerError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            fields: Vec::new(),
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            fields: Vec::new(),
        }
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self {
            kind: ErrorKind::Invalid,
            message: Some("validation failed".to_string()),
            fields,
        }
    }

    pub fn not_found() -> Self {
        Self::with_message(ErrorKind::NotFound, "submission not found")
    }

    pub fn invalid_resume_token() -> Self {
        Self::with_message(ErrorKind::InvalidResumeToken, "resume token is invalid or stale")
    }

    pub fn expired() -> Self {
        Self::with_message(ErrorKind::Expired, "this resume link has expired")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::InternalError, message)
    }

    fn builder(&self) -> ErrorBuilder {
        let mut builder = ErrorBuilder::new(self.kind);
        if let Some(message) = &self.message {
            builder = builder.message(message.clone());
        }
        if !self.fields.is_empty() {
            builder = builder.field_errors(&self.fields);
        }
        builder
    }

    pub fn into_envelope(&self) -> ErrorEnvelope {
        self.builder().envelope()
    }

    pub fn into_flat(&self) -> FlatError {
        self.builder().flat()
    }
}

impl From<SubmissionStoreError> for ManagerError {
    fn from(e: SubmissionStoreError) -> Self {
        ManagerError::internal(e.to_string())
    }
}

impl From<EventStoreError> for ManagerError {
    fn from(e: EventStoreError) -> Self {
        ManagerError::internal(e.to_string())
    }
}

impl From<DeliveryQueueError> for ManagerError {
    fn from(e: DeliveryQueueError) -> Self {
        ManagerError::internal(e.to_string())
    }
}

impl From<StorageBackendError> for ManagerError {
    fn from(e: StorageBackendError) -> Self {
        Self {
            kind: ErrorKind::StorageError,
            message: Some(e.to_string()),
            fields: Vec::new(),
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
