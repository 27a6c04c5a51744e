//! Acceptance action execution.
//!
//! One action is processed at a time. The plan's current status gates which
//! actions are legal; the process's snapshotted counts decide when a stage is
//! complete. The repository persists the mutated plan, process, and new
//! approval row in one transaction and dispatches the outbox after commit.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aidra_shared::config::AcceptanceConfig;

use crate::plan::{PaymentPlan, PlanStatus};
use crate::tasks::{Outbox, ScheduledTask};

use super::error::AcceptanceError;
use super::types::{AcceptanceAction, Approval, ApprovalProcess, ApprovalType};

/// One acceptance action taken by one user.
#[derive(Debug, Clone)]
pub struct AcceptanceInput {
    /// The action to process.
    pub action: AcceptanceAction,
    /// The acting user.
    pub actor: Uuid,
    /// Optional comment recorded on the sign-off.
    pub comment: Option<String>,
}

/// What an acceptance action did.
#[derive(Debug, Clone)]
pub struct AcceptanceOutcome {
    /// The sign-off row that was created.
    pub approval: Approval,
    /// True when this sign-off completed its stage and moved the plan.
    pub threshold_reached: bool,
    /// True when the plan reached `Accepted` and has no verification summary
    /// yet; the repository creates one in the same transaction.
    pub create_verification_summary: bool,
    /// Tasks to dispatch after commit.
    pub outbox: Outbox,
}

/// Stateless service executing acceptance actions.
pub struct AcceptanceService;

impl AcceptanceService {
    /// Processes one acceptance action against a plan and its process.
    ///
    /// The caller must have resolved the plan's approval process already; a
    /// plan in an acceptance status without one is a data-integrity error the
    /// repository raises before getting here.
    pub fn execute(
        plan: &mut PaymentPlan,
        process: &mut ApprovalProcess,
        input: AcceptanceInput,
        config: &AcceptanceConfig,
        now: DateTime<Utc>,
    ) -> Result<AcceptanceOutcome, AcceptanceError> {
        if !input.action.allowed_statuses().contains(&plan.status) {
            return Err(AcceptanceError::NotPossible {
                action: input.action,
                status: plan.status,
            });
        }

        let approval_type = input.action.approval_type();

        // The duplicate-signer guard for a rejection looks at the stage the
        // plan sits in, not at the REJECT row itself.
        let guard_type = match approval_type {
            ApprovalType::Reject => {
                ApprovalType::implied_by_status(plan.status).unwrap_or(ApprovalType::Reject)
            }
            positive => positive,
        };

        if approval_type != ApprovalType::Reject
            && process.count_of(approval_type) >= process.required_for(approval_type)
        {
            return Err(AcceptanceError::AlreadyCompleted { approval_type });
        }

        if !config.allow_multiple_approvals_per_user
            && process
                .approvals
                .iter()
                .any(|a| a.approval_type == guard_type && a.created_by == input.actor)
        {
            return Err(AcceptanceError::AlreadyApprovedByUser {
                approval_type: guard_type,
            });
        }

        let approval = Approval {
            id: Uuid::new_v4(),
            approval_type,
            created_by: input.actor,
            comment: input.comment,
            created_at: now,
        };
        process.approvals.push(approval.clone());

        let threshold_reached = approval_type == ApprovalType::Reject
            || process.count_of(approval_type) >= process.required_for(approval_type);

        let mut create_verification_summary = false;
        let mut outbox = Outbox::new();

        if threshold_reached {
            let target = match approval_type {
                ApprovalType::Approval => {
                    process.sent_for_authorization_date = Some(now);
                    PlanStatus::InAuthorization
                }
                ApprovalType::Authorization => {
                    process.sent_for_finance_release_date = Some(now);
                    PlanStatus::InReview
                }
                ApprovalType::FinanceRelease => {
                    create_verification_summary = true;
                    PlanStatus::Accepted
                }
                ApprovalType::Reject => PlanStatus::LockedFsp,
            };
            plan.set_status(target, now);
            outbox.push(ScheduledTask::NotifyApprovers {
                plan_id: plan.id,
                action: input.action.as_str().to_string(),
            });
        }

        Ok(AcceptanceOutcome {
            approval,
            threshold_reached,
            create_verification_summary,
            outbox,
        })
    }
}
