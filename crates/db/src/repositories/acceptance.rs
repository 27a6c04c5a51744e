//! Acceptance repository: sign-off actions against a plan's approval process.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use aidra_core::approval::{AcceptanceAction, AcceptanceInput, AcceptanceService};
use aidra_core::verification::VerificationSummary;
use aidra_shared::config::AcceptanceConfig;
use aidra_shared::{AppError, AppResult};

use crate::entities::{approval_processes, approvals, payment_plans, verification_summaries};

use super::convert;
use super::payment_plan::fetch_plan;
use super::{acceptance_err, db_err, dispatch_outbox, SharedTaskQueue};

/// Acceptance repository for approve/authorize/review/reject actions.
#[derive(Clone)]
pub struct AcceptanceRepository {
    db: DatabaseConnection,
    tasks: SharedTaskQueue,
}

impl AcceptanceRepository {
    /// Creates a new acceptance repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, tasks: SharedTaskQueue) -> Self {
        Self { db, tasks }
    }

    /// Processes one acceptance action by one user.
    ///
    /// The plan's approval process must exist (it is created at
    /// send-for-approval); its absence is logged and surfaced as a
    /// data-integrity error. When the finance release completes, the plan's
    /// verification summary is created in the same transaction if absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the action is not possible from the current
    /// status, the user already signed, the process is missing, the version
    /// is stale, or a database operation fails.
    pub async fn execute(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        action: AcceptanceAction,
        actor: Uuid,
        comment: Option<String>,
        config: &AcceptanceConfig,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;

        let process_model = approval_processes::Entity::find()
            .filter(approval_processes::Column::PaymentPlanId.eq(plan_id))
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                tracing::error!(plan = %plan.code, "approval process is missing");
                AppError::DataIntegrity(format!(
                    "Approval process is missing for Payment Plan {}",
                    plan.code
                ))
            })?;
        let approval_models = approvals::Entity::find()
            .filter(approvals::Column::ApprovalProcessId.eq(process_model.id))
            .order_by_asc(approvals::Column::CreatedAt)
            .all(&txn)
            .await
            .map_err(db_err)?;
        let mut process = convert::process_from_models(&process_model, &approval_models)?;

        let outcome = AcceptanceService::execute(
            &mut plan,
            &mut process,
            AcceptanceInput {
                action,
                actor,
                comment,
            },
            config,
            now,
        )
        .map_err(|e| acceptance_err(&e))?;

        convert::approval_to_insert(process.id, &outcome.approval)
            .insert(&txn)
            .await
            .map_err(db_err)?;

        let mut process_active: approval_processes::ActiveModel = process_model.into();
        process_active.sent_for_authorization_date =
            Set(process.sent_for_authorization_date.map(Into::into));
        process_active.sent_for_finance_release_date =
            Set(process.sent_for_finance_release_date.map(Into::into));
        process_active.update(&txn).await.map_err(db_err)?;

        if outcome.create_verification_summary {
            let existing = verification_summaries::Entity::find()
                .filter(verification_summaries::Column::PlanId.eq(plan_id))
                .one(&txn)
                .await
                .map_err(db_err)?;
            if existing.is_none() {
                let summary = VerificationSummary::new_pending(plan_id);
                verification_summaries::ActiveModel {
                    id: Set(summary.id),
                    plan_id: Set(summary.plan_id),
                    status: Set(summary.status.as_str().to_string()),
                    created_at: Set(now.into()),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
            }
        }

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        dispatch_outbox(&self.tasks, outcome.outbox);
        Ok(updated)
    }
}
