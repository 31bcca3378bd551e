//! The submission state machine per §4.F.

use crate::errors::DomainError;
use crate::submission::SubmissionState;

/// Triggers that drive a submission between states per §4.F's transition
/// table. Invalid combinations produce a `conflict`-kind domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTransition {
    /// Create with no fields.
    CreateEmpty,
    /// Create or set-fields with at least one non-empty field.
    SetNonEmptyFields,
    /// set-fields referencing a declared file field.
    SetFileField,
    UploadCompleted,
    /// submit with no approval gate matching.
    SubmitClean,
    /// submit with an approval gate matching.
    SubmitNeedsReview,
    Approve,
    Reject,
    RequestChanges,
    /// delivery.succeeded, only valid when a destination is configured.
    DeliverySucceeded,
    Expire,
    Cancel,
}

pub struct SubmissionStateMachine;

impl SubmissionStateMachine {
    /// Validate and compute the next state for a submission transition.
    /// `current` is `None` for the create-time transitions.
    pub fn transition(
        current: Option<SubmissionState>,
        trigger: SubmissionTransition,
    ) -> Result<SubmissionState, DomainError> {
        use SubmissionState::*;
        use SubmissionTransition::*;

        match (current, trigger) {
            (None, CreateEmpty) => Ok(Draft),
            (None, SetNonEmptyFields) => Ok(InProgress),
            (Some(Draft), SetNonEmptyFields) => Ok(InProgress),

            (Some(InProgress), SetFileField) => Ok(AwaitingUpload),
            (Some(AwaitingUpload), UploadCompleted) => Ok(InProgress),

            (Some(InProgress), SubmitClean) => Ok(Submitted),
            (Some(InProgress), SubmitNeedsReview) => Ok(NeedsReview),

            (Some(NeedsReview), Approve) => Ok(Approved),
            (Some(NeedsReview), Reject) => Ok(Rejected),
            (Some(NeedsReview), RequestChanges) => Ok(InProgress),

            (Some(Approved), DeliverySucceeded) => Ok(Finalized),
            (Some(Submitted), DeliverySucceeded) => Ok(Finalized),

            (Some(state), Expire) if !state.is_terminal() => Ok(Expired),
            (Some(state), Cancel) if !state.is_terminal() => Ok(Cancelled),

            (state, trigger) => Err(DomainError::InvalidTransition {
                current_state: state
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "(new)".to_string()),
                attempted_state: format!("{trigger:?}"),
                trigger: format!("{trigger:?}"),
            }),
        }
    }

    /// The state after a `setFields` write, given whether any touched path
    /// is a declared file field.
    ///
    /// §4.F's table only names the *first* field write out of `(new)` /
    /// `draft` and the file-field handoff into `awaiting_upload` — it has
    /// no arrow for a second, later field write while already
    /// `in_progress` or `awaiting_upload`. Those writes are legal and
    /// idempotent with respect to state (§8: "setFields(x={a:1}) then
    /// setFields(x={b:2})" stays in the same state across both calls), so
    /// this helper treats them as a no-op on state rather than routing
    /// them through `transition` and hitting its catch-all error arm.
    /// Field writes against any other state (submitted and beyond) are
    /// rejected — the record is no longer open for editing.
    pub fn for_set_fields(
        current: Option<SubmissionState>,
        touches_file_field: bool,
    ) -> Result<SubmissionState, DomainError> {
        use SubmissionState::*;
        use SubmissionTransition::*;

        match current {
            None | Some(Draft) => Self::transition(current, SetNonEmptyFields),
            Some(InProgress) if touches_file_field => Self::transition(current, SetFileField),
            Some(InProgress) => Ok(InProgress),
            Some(AwaitingUpload) => Ok(AwaitingUpload),
            Some(state) => Err(DomainError::InvalidTransition {
                current_state: format!("{state:?}"),
                attempted_state: "in_progress|awaiting_upload".to_string(),
                trigger: "SetFields".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionState::*;
    use SubmissionTransition::*;

    #[test]
    fn create_with_no_fields_lands_in_draft() {
        assert_eq!(
            SubmissionStateMachine::transition(None, CreateEmpty).unwrap(),
            Draft
        );
    }

    #[test]
    fn create_with_fields_skips_draft() {
        assert_eq!(
            SubmissionStateMachine::transition(None, SetNonEmptyFields).unwrap(),
            InProgress
        );
    }

    #[test]
    fn submit_with_matching_gate_goes_to_needs_review() {
        assert_eq!(
            SubmissionStateMachine::transition(Some(InProgress), SubmitNeedsReview).unwrap(),
            NeedsReview
        );
    }

    #[test]
    fn request_changes_returns_to_in_progress() {
        assert_eq!(
            SubmissionStateMachine::transition(Some(NeedsReview), RequestChanges).unwrap(),
            InProgress
        );
    }

    #[test]
    fn delivery_succeeded_finalizes_from_either_submitted_or_approved() {
        assert_eq!(
            SubmissionStateMachine::transition(Some(Submitted), DeliverySucceeded).unwrap(),
            Finalized
        );
        assert_eq!(
            SubmissionStateMachine::transition(Some(Approved), DeliverySucceeded).unwrap(),
            Finalized
        );
    }

    #[test]
    fn expire_and_cancel_apply_from_any_non_terminal_state() {
        assert_eq!(
            SubmissionStateMachine::transition(Some(AwaitingUpload), Expire).unwrap(),
            Expired
        );
        assert_eq!(
            SubmissionStateMachine::transition(Some(NeedsReview), Cancel).unwrap(),
            Cancelled
        );
    }

    #[test]
    fn terminal_states_reject_further_expire_or_cancel() {
        assert!(SubmissionStateMachine::transition(Some(Finalized), Expire).is_err());
        assert!(SubmissionStateMachine::transition(Some(Rejected), Cancel).is_err());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        assert!(SubmissionStateMachine::transition(Some(Draft), Approve).is_err());
    }
}
