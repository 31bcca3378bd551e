//! Domain errors

use thiserror::Error;

/// Domain errors for FormBridge submission lifecycle operations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid state transition: cannot reach {attempted_state} from {current_state} via {trigger}")]
    InvalidTransition {
        current_state: String,
        attempted_state: String,
        trigger: String,
    },

    #[error("invalid actor: {reason}")]
    InvalidActor { reason: String },

    #[error("invariant violation: {invariant}")]
    InvariantViolation { invariant: String },

    #[error("reserved field name: {field}")]
    ReservedField { field: String },
}
