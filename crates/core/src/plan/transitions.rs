//! The plan transition table, as data.
//!
//! Every lifecycle action lists its legal source statuses and its target
//! status here; `check` is the single gate all service actions go through.
//! Keeping the table in one place makes it testable without storage.

use std::fmt;

use super::error::PlanError;
use super::types::{BackgroundAction, PlanStatus};

/// A lifecycle action on a payment plan.
///
/// Acceptance-stage transitions (approve/authorize/review/reject) run through
/// the acceptance process, which applies its own source-status rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Lock the targeting population.
    TpLock,
    /// Unlock the targeting population.
    TpUnlock,
    /// Request an asynchronous full population rebuild.
    TpRebuild,
    /// Promote the targeting population to a draft payment plan.
    Draft,
    /// Open the draft for dispersion.
    Open,
    /// Lock the open plan's population.
    Lock,
    /// Unlock a locked plan back to open.
    Unlock,
    /// Bind the FSP and delivery mechanism.
    LockFsp,
    /// Release the FSP binding.
    UnlockFsp,
    /// Send the plan into the acceptance process.
    SendForApproval,
    /// Close a fully reconciled plan.
    Finish,
}

impl PlanAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TpLock => "TP_LOCK",
            Self::TpUnlock => "TP_UNLOCK",
            Self::TpRebuild => "TP_REBUILD",
            Self::Draft => "DRAFT",
            Self::Open => "OPEN",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::LockFsp => "LOCK_FSP",
            Self::UnlockFsp => "UNLOCK_FSP",
            Self::SendForApproval => "SEND_FOR_APPROVAL",
            Self::Finish => "FINISH",
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// All lifecycle actions. Used by table-driven tests.
pub const ALL_ACTIONS: [PlanAction; 11] = [
    PlanAction::TpLock,
    PlanAction::TpUnlock,
    PlanAction::TpRebuild,
    PlanAction::Draft,
    PlanAction::Open,
    PlanAction::Lock,
    PlanAction::Unlock,
    PlanAction::LockFsp,
    PlanAction::UnlockFsp,
    PlanAction::SendForApproval,
    PlanAction::Finish,
];

/// Legal source statuses for an action.
#[must_use]
pub const fn allowed_sources(action: PlanAction) -> &'static [PlanStatus] {
    match action {
        PlanAction::TpLock => &[PlanStatus::TpOpen],
        PlanAction::TpUnlock => &[
            PlanStatus::TpLocked,
            PlanStatus::TpRuleEngineWait,
            PlanStatus::TpRuleEngineRun,
            PlanStatus::TpRuleEngineCompleted,
            PlanStatus::TpRuleEngineError,
        ],
        PlanAction::TpRebuild => &[PlanStatus::TpOpen, PlanStatus::TpLocked],
        PlanAction::Draft => &[
            PlanStatus::TpLocked,
            PlanStatus::TpRuleEngineCompleted,
            PlanStatus::TpRuleEngineError,
            PlanStatus::Open,
        ],
        PlanAction::Open => &[PlanStatus::Draft],
        PlanAction::Lock => &[PlanStatus::Open],
        PlanAction::Unlock => &[PlanStatus::Locked],
        PlanAction::LockFsp => &[PlanStatus::Locked],
        PlanAction::UnlockFsp => &[PlanStatus::LockedFsp],
        PlanAction::SendForApproval => &[PlanStatus::LockedFsp],
        PlanAction::Finish => &[PlanStatus::Accepted, PlanStatus::Finished],
    }
}

/// Target status of an action from a legal source.
///
/// `TpRebuild` keeps the current status: it only marks the build pending.
#[must_use]
pub const fn target_status(action: PlanAction, current: PlanStatus) -> PlanStatus {
    match action {
        PlanAction::TpLock => PlanStatus::TpLocked,
        PlanAction::TpUnlock => PlanStatus::TpOpen,
        PlanAction::TpRebuild => current,
        PlanAction::Draft => PlanStatus::Draft,
        PlanAction::Open | PlanAction::Unlock => PlanStatus::Open,
        PlanAction::Lock | PlanAction::UnlockFsp => PlanStatus::Locked,
        PlanAction::LockFsp => PlanStatus::LockedFsp,
        PlanAction::SendForApproval => PlanStatus::InApproval,
        PlanAction::Finish => PlanStatus::Finished,
    }
}

/// Validates an action against the current status, returning the target.
pub fn check(action: PlanAction, current: PlanStatus) -> Result<PlanStatus, PlanError> {
    if allowed_sources(action).contains(&current) {
        Ok(target_status(action, current))
    } else {
        Err(PlanError::IllegalTransition {
            action,
            status: current,
        })
    }
}

/// Primary statuses from which a background action class may start.
#[must_use]
pub const fn background_allowed_statuses(action: BackgroundAction) -> &'static [PlanStatus] {
    match action {
        BackgroundAction::RuleEngineRun | BackgroundAction::RuleEngineError => {
            &[PlanStatus::Locked]
        }
        BackgroundAction::XlsxExporting | BackgroundAction::XlsxExportError => {
            &[PlanStatus::Accepted, PlanStatus::Finished]
        }
        BackgroundAction::XlsxImportingEntitlements => &[PlanStatus::Locked],
        BackgroundAction::XlsxImportingReconciliation | BackgroundAction::XlsxImportError => {
            &[PlanStatus::Accepted, PlanStatus::Finished]
        }
        BackgroundAction::ExcludingBeneficiaries | BackgroundAction::ExcludeBeneficiariesError => {
            &[PlanStatus::Open, PlanStatus::Locked]
        }
        BackgroundAction::SendingToPaymentGateway
        | BackgroundAction::SendToPaymentGatewayError => &[PlanStatus::Accepted],
    }
}

/// Validates that a background action may start now.
///
/// Starting is legal when no background action is outstanding, or when the
/// outstanding one is this class's terminal error state (an explicit retry).
pub fn check_background(
    action: BackgroundAction,
    status: PlanStatus,
    current: Option<BackgroundAction>,
) -> Result<(), PlanError> {
    if !background_allowed_statuses(action).contains(&status) {
        return Err(PlanError::BackgroundActionNotAllowed { action, status });
    }
    match current {
        None => Ok(()),
        Some(outstanding) if outstanding.is_error() && outstanding == action.error_state() => {
            Ok(())
        }
        Some(outstanding) => Err(PlanError::BackgroundActionInProgress {
            current: outstanding,
        }),
    }
}
