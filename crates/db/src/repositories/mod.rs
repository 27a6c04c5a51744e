//! Repository abstractions for data access.
//!
//! Every state-changing method follows the same shape: begin a transaction,
//! fetch and decode the aggregate, run the pure core logic, write the result
//! back, commit, and only then dispatch the outbox to the task queue. An
//! error anywhere aborts the transaction, so core errors are never partially
//! applied.

pub mod acceptance;
mod convert;
pub mod exchange_rate;
pub mod payment;
pub mod payment_plan;
pub mod reconciliation;
pub mod split;

pub use acceptance::AcceptanceRepository;
pub use exchange_rate::{ExchangeRateRepository, PrefetchedRate};
pub use payment::PaymentRepository;
pub use payment_plan::PaymentPlanRepository;
pub use reconciliation::{ImportReport, ReconciliationRepository};
pub use split::SplitRepository;

use std::sync::Arc;

use sea_orm::DbErr;

use aidra_core::approval::AcceptanceError;
use aidra_core::payment::GeneratorError;
use aidra_core::plan::PlanError;
use aidra_core::reconciliation::ReconciliationError;
use aidra_core::split::SplitError;
use aidra_core::tasks::{Outbox, TaskQueue};
use aidra_shared::AppError;

/// Shared handle to the task queue collaborator.
pub type SharedTaskQueue = Arc<dyn TaskQueue + Send + Sync>;

pub(crate) fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Dispatches an action's outbox to the task queue, strictly after commit.
pub(crate) fn dispatch_outbox(queue: &SharedTaskQueue, outbox: Outbox) {
    for task in outbox.into_tasks() {
        tracing::debug!(task = task.name(), "scheduling background task");
        queue.schedule(task);
    }
}

pub(crate) fn plan_err(e: &PlanError) -> AppError {
    match e {
        PlanError::IllegalTransition { .. }
        | PlanError::DispersionEndDateNotInFuture { .. }
        | PlanError::CurrencyImmutable { .. }
        | PlanError::InvalidMechanismAssignment { .. }
        | PlanError::UnknownHousehold { .. } => AppError::Validation(e.to_string()),
        PlanError::BackgroundActionInProgress { .. }
        | PlanError::BackgroundActionNotAllowed { .. } => AppError::Conflict(e.to_string()),
        PlanError::MissingExchangeRate { .. } => AppError::ExternalService(e.to_string()),
        PlanError::FspNotAssigned
        | PlanError::NoEligiblePayments
        | PlanError::MissingEntitlement { .. }
        | PlanError::FollowUpOfFollowUp
        | PlanError::NoUnsuccessfulPayments => AppError::BusinessRule(e.to_string()),
    }
}

pub(crate) fn acceptance_err(e: &AcceptanceError) -> AppError {
    if e.is_data_integrity() {
        tracing::error!(error = %e, "acceptance data-integrity violation");
        AppError::DataIntegrity(e.to_string())
    } else {
        AppError::Validation(e.to_string())
    }
}

pub(crate) fn generator_err(e: &GeneratorError) -> AppError {
    if e.is_data_integrity() {
        tracing::error!(error = %e, "payment generation data-integrity violation");
        AppError::DataIntegrity(e.to_string())
    } else {
        AppError::NotFound(e.to_string())
    }
}

pub(crate) fn split_err(e: &SplitError) -> AppError {
    AppError::Validation(e.to_string())
}

pub(crate) fn reconciliation_err(e: &ReconciliationError) -> AppError {
    if e.is_data_integrity() {
        tracing::error!(error = %e, "reconciliation data-integrity violation");
        AppError::DataIntegrity(e.to_string())
    } else {
        AppError::Validation(e.to_string())
    }
}

/// Fails a mutation whose caller holds a stale plan snapshot.
pub(crate) fn check_version(current: i64, expected: Option<i64>) -> Result<(), AppError> {
    match expected {
        Some(version) if version != current => Err(AppError::Conflict(format!(
            "Payment Plan was modified concurrently (version {version} is stale, current is {current})"
        ))),
        _ => Ok(()),
    }
}
