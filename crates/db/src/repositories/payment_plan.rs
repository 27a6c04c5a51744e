//! Payment plan repository: lifecycle actions wrapped in transactions.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use aidra_core::aggregator::MemberDemographics;
use aidra_core::payment::{Payment, PaymentGenerator};
use aidra_core::plan::{
    create_follow_up, BackgroundAction, DeliveryMechanismAssignment, FollowUpInput, OpenInput,
    PaymentPlan, PlanStatus, PlanService,
};
use aidra_core::tasks::{Outbox, ScheduledTask};
use aidra_shared::{AppError, AppResult};

use crate::entities::{
    acceptance_thresholds, approval_processes, approvals, delivery_mechanism_assignments,
    exchange_rates, households, individuals, payment_plans, payments, program_cycles,
};

use super::convert;
use super::exchange_rate::PrefetchedRate;
use super::{check_version, db_err, dispatch_outbox, plan_err, SharedTaskQueue};

/// Plan statuses that claim a household against sibling plans in the cycle.
const CONFLICTING_STATUSES: [PlanStatus; 7] = [
    PlanStatus::Locked,
    PlanStatus::LockedFsp,
    PlanStatus::InApproval,
    PlanStatus::InAuthorization,
    PlanStatus::InReview,
    PlanStatus::Accepted,
    PlanStatus::Finished,
];

/// Payment plan repository for lifecycle state transitions.
#[derive(Clone)]
pub struct PaymentPlanRepository {
    db: DatabaseConnection,
    tasks: SharedTaskQueue,
}

impl PaymentPlanRepository {
    /// Creates a new payment plan repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, tasks: SharedTaskQueue) -> Self {
        Self { db, tasks }
    }

    /// Creates a plan in the targeting-open state and schedules the initial
    /// population build.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create_targeting(
        &self,
        program_cycle_id: Uuid,
        targeting_criteria_id: Uuid,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let code = next_plan_code(&txn).await?;
        let plan = PaymentPlan::new_targeting(
            Uuid::new_v4(),
            code,
            program_cycle_id,
            targeting_criteria_id,
            now,
        );
        let model = convert::plan_to_insert(&plan, now.into())
            .insert(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        let mut outbox = Outbox::new();
        outbox.push(ScheduledTask::RebuildPopulation { plan_id: plan.id });
        dispatch_outbox(&self.tasks, outbox);
        Ok(model)
    }

    /// Fetches a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan does not exist or the query fails.
    pub async fn get(&self, plan_id: Uuid) -> AppResult<payment_plans::Model> {
        payment_plans::Entity::find_by_id(plan_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("Payment Plan {plan_id}")))
    }

    /// Locks the targeting population, applying the vulnerability-score
    /// filter when bounds are set.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn tp_lock(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let household_ids: Vec<Uuid> = plan_payments.iter().map(|p| p.household_id).collect();
        let scores = fetch_vulnerability_scores(&txn, &household_ids).await?;

        PlanService::tp_lock(&mut plan, &mut plan_payments, &scores, now)
            .map_err(|e| plan_err(&e))?;

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Unlocks the targeting population and schedules a statistics rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn tp_unlock(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let outbox = PlanService::tp_unlock(&mut plan, &mut plan_payments, now)
            .map_err(|e| plan_err(&e))?;

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        dispatch_outbox(&self.tasks, outbox);
        Ok(updated)
    }

    /// Requests an asynchronous full population rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn tp_rebuild(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let outbox = PlanService::tp_rebuild(&mut plan).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        dispatch_outbox(&self.tasks, outbox);
        Ok(updated)
    }

    /// Promotes the targeting population to a draft payment plan.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, missing FSP, stale version,
    /// or database failure.
    pub async fn draft(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        PlanService::draft(&mut plan, now).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Opens the draft for dispersion: freezes currency and exchange rate,
    /// activates the program cycle, back-fills payment currency, and
    /// recomputes money fields.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, validation failure, missing
    /// exchange rate, stale version, or database failure.
    pub async fn open(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        input: OpenInput,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();
        let today = now.date_naive();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let rates = PrefetchedRate::new(fetch_rate(&txn, &input.currency, today).await?);
        PlanService::open(&mut plan, &mut plan_payments, &input, &rates, today, now)
            .map_err(|e| plan_err(&e))?;

        activate_program_cycle(&txn, plan.program_cycle_id).await?;
        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Locks the open plan's population, marking hard conflicts against
    /// sibling plans in the same program cycle.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, an empty eligible set,
    /// stale version, or database failure.
    pub async fn lock(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let hard_conflicted =
            fetch_hard_conflicts(&txn, &plan, &plan_payments).await?;
        let members = fetch_members(&txn, &plan_payments).await?;

        PlanService::lock(
            &mut plan,
            &mut plan_payments,
            &hard_conflicted,
            &members,
            now.date_naive(),
            now,
        )
        .map_err(|e| plan_err(&e))?;

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Unlocks a locked plan back to open, restoring conflicted payments.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn unlock(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;
        let members = fetch_members(&txn, &plan_payments).await?;

        PlanService::unlock(&mut plan, &mut plan_payments, &members, now.date_naive(), now)
            .map_err(|e| plan_err(&e))?;

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Records the plan's ordered delivery-mechanism choices, replacing any
    /// previous set.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid assignment, stale version, or database
    /// failure.
    pub async fn assign_delivery_mechanisms(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        assignments: Vec<DeliveryMechanismAssignment>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        PlanService::assign_delivery_mechanisms(&mut plan, &assignments)
            .map_err(|e| plan_err(&e))?;

        delivery_mechanism_assignments::Entity::delete_many()
            .filter(delivery_mechanism_assignments::Column::PlanId.eq(plan_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        for assignment in &assignments {
            delivery_mechanism_assignments::ActiveModel {
                id: Set(Uuid::new_v4()),
                plan_id: Set(plan_id),
                mechanism: Set(assignment.mechanism.clone()),
                fsp_id: Set(assignment.fsp_id),
                order_index: Set(assignment.order),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Binds the FSP and delivery mechanism onto the plan and its payments.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, a missing entitlement,
    /// stale version, or database failure.
    pub async fn lock_fsp(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        PlanService::lock_fsp(&mut plan, &mut plan_payments, now).map_err(|e| plan_err(&e))?;

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Releases the FSP binding.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn unlock_fsp(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        PlanService::unlock_fsp(&mut plan, now).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Sends the plan into the acceptance process, snapshotting the required
    /// approval counts from the threshold table.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn send_for_approval(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        sent_by: Uuid,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;

        let threshold_models = acceptance_thresholds::Entity::find()
            .order_by_asc(acceptance_thresholds::Column::Priority)
            .all(&txn)
            .await
            .map_err(db_err)?;
        let thresholds = threshold_models
            .iter()
            .map(convert::threshold_from_model)
            .collect::<AppResult<Vec<_>>>()?;

        let total_usd = plan.total_entitled_quantity_usd;
        let matched = thresholds.iter().any(|t| {
            t.min_usd.is_none_or(|min| total_usd >= min)
                && t.max_usd.is_none_or(|max| total_usd <= max)
        });
        if !matched {
            tracing::warn!(
                plan = %plan.code,
                %total_usd,
                "no acceptance threshold matched; defaulting required approvals to 1"
            );
        }

        let (process, outbox) =
            PlanService::send_for_approval(&mut plan, &thresholds, sent_by, now)
                .map_err(|e| plan_err(&e))?;

        // A plan holds at most one process; a re-send after a rejection
        // replaces the previous chain wholesale.
        let stale_process_ids: Vec<Uuid> = approval_processes::Entity::find()
            .filter(approval_processes::Column::PaymentPlanId.eq(plan_id))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if !stale_process_ids.is_empty() {
            approvals::Entity::delete_many()
                .filter(approvals::Column::ApprovalProcessId.is_in(stale_process_ids))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            approval_processes::Entity::delete_many()
                .filter(approval_processes::Column::PaymentPlanId.eq(plan_id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        convert::process_to_insert(&process, now.into())
            .insert(&txn)
            .await
            .map_err(db_err)?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        dispatch_outbox(&self.tasks, outbox);
        Ok(updated)
    }

    /// Closes a fully reconciled plan.
    ///
    /// # Errors
    ///
    /// Returns an error on an illegal transition, stale version, or database
    /// failure.
    pub async fn finish(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        PlanService::status_finished(&mut plan, now).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Manually excludes households from the plan, guarded by the
    /// excluding-beneficiaries background action.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown household, an outstanding background
    /// job, stale version, or database failure.
    pub async fn exclude_households(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        household_codes: Vec<String>,
        reason: Option<String>,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        PlanService::start_background_action(&mut plan, BackgroundAction::ExcludingBeneficiaries)
            .map_err(|e| plan_err(&e))?;
        PlanService::exclude_households(
            &mut plan,
            &mut plan_payments,
            &household_codes,
            reason.as_deref(),
        )
        .map_err(|e| plan_err(&e))?;
        PlanService::complete_background_action(&mut plan);

        write_payments(&txn, payment_models, &plan_payments).await?;
        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Creates a follow-up plan for the source plan's unsuccessful payments
    /// and schedules their materialization.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is itself a follow-up, has no
    /// unsuccessful payments, or the database operation fails.
    pub async fn create_follow_up(
        &self,
        source_plan_id: Uuid,
        dispersion_start_date: NaiveDate,
        dispersion_end_date: NaiveDate,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (_, source) = fetch_plan(&txn, source_plan_id, None).await?;
        let (_, source_payments) = fetch_payments(&txn, source_plan_id).await?;

        let withdrawn = fetch_withdrawn_households(&txn, &source_payments).await?;
        let claimed = fetch_follow_up_claims(&txn, source_plan_id, None).await?;
        let unsuccessful = PaymentGenerator::unsuccessful_payments_for_follow_up(
            &source_payments,
            &withdrawn,
            &claimed,
        );

        let input = FollowUpInput {
            id: Uuid::new_v4(),
            code: next_plan_code(&txn).await?,
            // The targeting criteria rows are deep-copied by the targeting
            // collaborator under this fresh identity.
            targeting_criteria_id: Uuid::new_v4(),
            dispersion_start_date,
            dispersion_end_date,
        };
        let (follow_up, outbox) = create_follow_up(&source, unsuccessful.len(), input, now)
            .map_err(|e| plan_err(&e))?;

        let inserted = convert::plan_to_insert(&follow_up, now.into())
            .insert(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        dispatch_outbox(&self.tasks, outbox);
        Ok(inserted)
    }

    /// Hands the locked plan to the entitlement-formula engine.
    ///
    /// # Errors
    ///
    /// Returns an error when another job is outstanding or the plan is not
    /// locked.
    pub async fn run_entitlement_formula(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        formula_id: Uuid,
    ) -> AppResult<payment_plans::Model> {
        self.start_background_job(
            plan_id,
            expected_version,
            BackgroundAction::RuleEngineRun,
            ScheduledTask::RunEntitlementFormula {
                plan_id,
                formula_id,
            },
        )
        .await
    }

    /// Schedules the per-FSP disbursement workbook export.
    ///
    /// # Errors
    ///
    /// Returns an error when an export is already in progress or the plan is
    /// not accepted/finished.
    pub async fn export_xlsx(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        self.start_background_job(
            plan_id,
            expected_version,
            BackgroundAction::XlsxExporting,
            ScheduledTask::ExportXlsx { plan_id },
        )
        .await
    }

    /// Schedules the hand-off of an accepted plan to the payment gateway.
    ///
    /// # Errors
    ///
    /// Returns an error when a send is already in progress or the plan is not
    /// accepted.
    pub async fn send_to_payment_gateway(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
    ) -> AppResult<payment_plans::Model> {
        self.start_background_job(
            plan_id,
            expected_version,
            BackgroundAction::SendingToPaymentGateway,
            ScheduledTask::SendToPaymentGateway { plan_id },
        )
        .await
    }

    /// Starts a background job of the given class.
    ///
    /// # Errors
    ///
    /// Returns an error when another job is outstanding or the class is not
    /// legal in the current status.
    pub async fn start_background_action(
        &self,
        plan_id: Uuid,
        action: BackgroundAction,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, None).await?;
        PlanService::start_background_action(&mut plan, action).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Records a background action and emits its task after commit.
    async fn start_background_job(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        action: BackgroundAction,
        task: ScheduledTask,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        PlanService::start_background_action(&mut plan, action).map_err(|e| plan_err(&e))?;

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        let mut outbox = Outbox::new();
        outbox.push(task);
        dispatch_outbox(&self.tasks, outbox);
        Ok(updated)
    }

    /// Clears the background-action status after a successful job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn complete_background_action(
        &self,
        plan_id: Uuid,
    ) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, None).await?;
        PlanService::complete_background_action(&mut plan);

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    /// Drops the outstanding background job into its terminal error state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn fail_background_action(&self, plan_id: Uuid) -> AppResult<payment_plans::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, None).await?;
        PlanService::fail_background_action(&mut plan);

        let updated = convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }
}

// ============================================================================
// Shared fetch/write helpers
// ============================================================================

pub(crate) async fn fetch_plan(
    txn: &DatabaseTransaction,
    plan_id: Uuid,
    expected_version: Option<i64>,
) -> AppResult<(payment_plans::Model, PaymentPlan)> {
    let model = payment_plans::Entity::find_by_id(plan_id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(format!("Payment Plan {plan_id}")))?;
    check_version(model.version, expected_version)?;
    let plan = convert::plan_from_model(&model)?;
    Ok((model, plan))
}

pub(crate) async fn fetch_payments(
    txn: &DatabaseTransaction,
    plan_id: Uuid,
) -> AppResult<(Vec<payments::Model>, Vec<Payment>)> {
    let models = payments::Entity::find()
        .filter(payments::Column::PlanId.eq(plan_id))
        .order_by_asc(payments::Column::Code)
        .all(txn)
        .await
        .map_err(db_err)?;
    let decoded = models
        .iter()
        .map(convert::payment_from_model)
        .collect::<AppResult<Vec<_>>>()?;
    Ok((models, decoded))
}

/// Writes mutated payments back, preserving the fetch order alignment.
pub(crate) async fn write_payments(
    txn: &DatabaseTransaction,
    models: Vec<payments::Model>,
    plan_payments: &[Payment],
) -> AppResult<()> {
    let now = Utc::now().into();
    for (model, payment) in models.into_iter().zip(plan_payments) {
        convert::apply_payment(model, payment, now)
            .update(txn)
            .await
            .map_err(db_err)?;
    }
    Ok(())
}

async fn next_plan_code(txn: &DatabaseTransaction) -> AppResult<String> {
    let count = payment_plans::Entity::find()
        .count(txn)
        .await
        .map_err(db_err)?;
    Ok(format!("PP-{}-{:06}", Utc::now().year(), count + 1))
}

async fn fetch_vulnerability_scores(
    txn: &DatabaseTransaction,
    household_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Decimal>> {
    if household_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = households::Entity::find()
        .filter(households::Column::Id.is_in(household_ids.to_vec()))
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows
        .into_iter()
        .filter_map(|h| h.vulnerability_score.map(|score| (h.id, score)))
        .collect())
}

async fn fetch_members(
    txn: &DatabaseTransaction,
    plan_payments: &[Payment],
) -> AppResult<HashMap<Uuid, Vec<MemberDemographics>>> {
    let household_ids: Vec<Uuid> = plan_payments.iter().map(|p| p.household_id).collect();
    if household_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = individuals::Entity::find()
        .filter(individuals::Column::HouseholdId.is_in(household_ids))
        .all(txn)
        .await
        .map_err(db_err)?;

    let mut members: HashMap<Uuid, Vec<MemberDemographics>> = HashMap::new();
    for row in rows {
        let individual = convert::individual_from_model(&row)?;
        members
            .entry(individual.household_id)
            .or_default()
            .push(MemberDemographics::from(&individual));
    }
    Ok(members)
}

/// Payments of this plan whose household is already claimed by a sibling
/// plan of the same program cycle that has progressed past open.
async fn fetch_hard_conflicts(
    txn: &DatabaseTransaction,
    plan: &PaymentPlan,
    plan_payments: &[Payment],
) -> AppResult<HashSet<Uuid>> {
    let statuses: Vec<String> = CONFLICTING_STATUSES
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();
    let sibling_ids: Vec<Uuid> = payment_plans::Entity::find()
        .filter(payment_plans::Column::ProgramCycleId.eq(plan.program_cycle_id))
        .filter(payment_plans::Column::Id.ne(plan.id))
        .filter(payment_plans::Column::Status.is_in(statuses))
        .all(txn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if sibling_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let claimed: HashSet<Uuid> = payments::Entity::find()
        .filter(payments::Column::PlanId.is_in(sibling_ids))
        .filter(payments::Column::State.eq("ACTIVE"))
        .all(txn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|p| p.household_id)
        .collect();

    Ok(plan_payments
        .iter()
        .filter(|p| claimed.contains(&p.household_id))
        .map(|p| p.id)
        .collect())
}

pub(crate) async fn fetch_withdrawn_households(
    txn: &DatabaseTransaction,
    plan_payments: &[Payment],
) -> AppResult<HashSet<Uuid>> {
    let household_ids: Vec<Uuid> = plan_payments.iter().map(|p| p.household_id).collect();
    if household_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows = households::Entity::find()
        .filter(households::Column::Id.is_in(household_ids))
        .filter(households::Column::IsWithdrawn.eq(true))
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(|h| h.id).collect())
}

/// Households already claimed by another follow-up plan of the same source.
pub(crate) async fn fetch_follow_up_claims(
    txn: &DatabaseTransaction,
    source_plan_id: Uuid,
    excluding_plan: Option<Uuid>,
) -> AppResult<HashSet<Uuid>> {
    let mut query = payment_plans::Entity::find()
        .filter(payment_plans::Column::SourcePlanId.eq(source_plan_id));
    if let Some(plan_id) = excluding_plan {
        query = query.filter(payment_plans::Column::Id.ne(plan_id));
    }
    let follow_up_ids: Vec<Uuid> = query
        .all(txn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if follow_up_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows = payments::Entity::find()
        .filter(payments::Column::PlanId.is_in(follow_up_ids))
        .filter(payments::Column::State.eq("ACTIVE"))
        .all(txn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(|p| p.household_id).collect())
}

async fn fetch_rate(
    txn: &DatabaseTransaction,
    currency: &str,
    as_of: NaiveDate,
) -> AppResult<Option<Decimal>> {
    let row = exchange_rates::Entity::find()
        .filter(exchange_rates::Column::CurrencyCode.eq(currency))
        .filter(exchange_rates::Column::EffectiveDate.lte(as_of))
        .order_by_desc(exchange_rates::Column::EffectiveDate)
        .one(txn)
        .await
        .map_err(db_err)?;
    Ok(row.map(|r| r.rate))
}

async fn activate_program_cycle(txn: &DatabaseTransaction, cycle_id: Uuid) -> AppResult<()> {
    let cycle = program_cycles::Entity::find_by_id(cycle_id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::DataIntegrity(format!("Program cycle {cycle_id} is missing")))?;
    if cycle.status != "ACTIVE" {
        let mut active: program_cycles::ActiveModel = cycle.into();
        active.status = Set("ACTIVE".to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(txn).await.map_err(db_err)?;
    }
    Ok(())
}
