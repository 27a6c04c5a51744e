//! Acceptance process error types.

use thiserror::Error;

use crate::plan::PlanStatus;

use super::types::{AcceptanceAction, ApprovalType};

/// Errors that can occur while processing an acceptance action.
#[derive(Debug, Error)]
pub enum AcceptanceError {
    /// The action is not valid from the plan's current status.
    #[error("Not possible to create {action} for Payment Plan within status {status}")]
    NotPossible {
        /// The attempted action.
        action: AcceptanceAction,
        /// The plan's current status.
        status: PlanStatus,
    },

    /// The plan has no approval process although its status requires one.
    ///
    /// The process is created when the plan is sent for approval; its absence
    /// means an invariant was broken elsewhere.
    #[error("Approval process is missing for Payment Plan {plan_code}")]
    MissingProcess {
        /// The plan's external code.
        plan_code: String,
    },

    /// The required number of sign-offs of this type is already met.
    #[error("Number of required {approval_type} sign-offs has already been reached")]
    AlreadyCompleted {
        /// The saturated approval type.
        approval_type: ApprovalType,
    },

    /// The user already signed off this type in this process.
    #[error("You have already created a {approval_type} for this Payment Plan")]
    AlreadyApprovedByUser {
        /// The approval type the user already signed.
        approval_type: ApprovalType,
    },
}

impl AcceptanceError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotPossible { .. } | Self::AlreadyCompleted { .. } => 400,
            Self::AlreadyApprovedByUser { .. } => 403,
            Self::MissingProcess { .. } => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotPossible { .. } => "ACCEPTANCE_NOT_POSSIBLE",
            Self::MissingProcess { .. } => "MISSING_APPROVAL_PROCESS",
            Self::AlreadyCompleted { .. } => "APPROVALS_ALREADY_COMPLETED",
            Self::AlreadyApprovedByUser { .. } => "ALREADY_APPROVED_BY_USER",
        }
    }

    /// True for errors that indicate a broken invariant rather than user misuse.
    #[must_use]
    pub const fn is_data_integrity(&self) -> bool {
        matches!(self, Self::MissingProcess { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_possible_message() {
        let err = AcceptanceError::NotPossible {
            action: AcceptanceAction::Review,
            status: PlanStatus::InApproval,
        };
        assert_eq!(
            err.to_string(),
            "Not possible to create REVIEW for Payment Plan within status IN_APPROVAL"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_missing_process_is_data_integrity() {
        let err = AcceptanceError::MissingProcess {
            plan_code: "PP-2026-000001".to_string(),
        };
        assert_eq!(err.status_code(), 500);
        assert!(err.is_data_integrity());
    }

    #[test]
    fn test_duplicate_signer_error() {
        let err = AcceptanceError::AlreadyApprovedByUser {
            approval_type: ApprovalType::Authorization,
        };
        assert!(err.to_string().contains("AUTHORIZATION"));
        assert_eq!(err.status_code(), 403);
    }
}
