//! Transactional-outbox task scheduling.
//!
//! Core actions never talk to the task queue directly. They accumulate
//! [`ScheduledTask`] values into an [`Outbox`] which the repository drains to
//! the [`TaskQueue`] collaborator strictly **after** its transaction commits,
//! so a rolled-back action never leaves a stray background job behind.

use uuid::Uuid;

/// A background job to be enqueued after the surrounding transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Full rebuild of a targeting population.
    RebuildPopulation {
        /// Plan to rebuild.
        plan_id: Uuid,
    },
    /// Refresh of population statistics after an unlock.
    UpdatePopulationStats {
        /// Plan to refresh.
        plan_id: Uuid,
    },
    /// Materialization of follow-up payments for a freshly created follow-up plan.
    PrepareFollowUpPayments {
        /// The follow-up plan.
        plan_id: Uuid,
    },
    /// Entitlement-formula run against a locked plan.
    RunEntitlementFormula {
        /// Target plan.
        plan_id: Uuid,
        /// Formula to execute.
        formula_id: Uuid,
    },
    /// Per-FSP disbursement workbook export.
    ExportXlsx {
        /// Plan to export.
        plan_id: Uuid,
    },
    /// Hand-off of an accepted plan (or one split of it) to the payment gateway.
    SendToPaymentGateway {
        /// Plan to send.
        plan_id: Uuid,
    },
    /// User notification about an approval-stage change.
    NotifyApprovers {
        /// Plan the notification is about.
        plan_id: Uuid,
        /// The action that triggered it (e.g. `SEND_FOR_APPROVAL`, `APPROVE`).
        action: String,
    },
}

impl ScheduledTask {
    /// Stable task name used for queue routing and logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RebuildPopulation { .. } => "rebuild_population",
            Self::UpdatePopulationStats { .. } => "update_population_stats",
            Self::PrepareFollowUpPayments { .. } => "prepare_follow_up_payments",
            Self::RunEntitlementFormula { .. } => "run_entitlement_formula",
            Self::ExportXlsx { .. } => "export_xlsx",
            Self::SendToPaymentGateway { .. } => "send_to_payment_gateway",
            Self::NotifyApprovers { .. } => "notify_approvers",
        }
    }
}

/// Accumulator for tasks emitted by a core action.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outbox {
    tasks: Vec<ScheduledTask>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Queues a task for post-commit dispatch.
    pub fn push(&mut self, task: ScheduledTask) {
        self.tasks.push(task);
    }

    /// Returns true when no tasks were emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Read-only view of the queued tasks.
    #[must_use]
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Consumes the outbox, yielding its tasks in emission order.
    #[must_use]
    pub fn into_tasks(self) -> Vec<ScheduledTask> {
        self.tasks
    }
}

/// Fire-and-forget task queue collaborator.
///
/// `schedule` observes no return value; failures are the queue's problem and
/// must never affect the already-committed transaction.
pub trait TaskQueue {
    /// Enqueues a background task.
    fn schedule(&self, task: ScheduledTask);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_preserves_emission_order() {
        let plan_id = Uuid::new_v4();
        let mut outbox = Outbox::new();
        assert!(outbox.is_empty());

        outbox.push(ScheduledTask::RebuildPopulation { plan_id });
        outbox.push(ScheduledTask::NotifyApprovers {
            plan_id,
            action: "SEND_FOR_APPROVAL".to_string(),
        });

        let tasks = outbox.into_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name(), "rebuild_population");
        assert_eq!(tasks[1].name(), "notify_approvers");
    }
}
