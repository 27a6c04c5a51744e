//! Payment repository: bulk materialization and entitlement write-back.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use aidra_core::aggregator::{self, MemberDemographics};
use aidra_core::household::DeliveryMechanism;
use aidra_core::payment::{HouseholdWithCollector, Payment, PaymentGenerator};
use aidra_core::plan::BuildStatus;
use aidra_core::verification::PaymentVerification;
use aidra_shared::{AppError, AppResult};

use crate::entities::{households, individuals, payment_verifications, payments};

use super::convert;
use super::payment_plan::{
    fetch_follow_up_claims, fetch_payments, fetch_plan, fetch_withdrawn_households,
    write_payments,
};
use super::{db_err, generator_err};

/// Payment repository for bulk payment operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Materializes one payment per targeted household.
    ///
    /// The household ID set is the targeting collaborator's query result.
    /// The whole batch is inserted in one transaction together with a pending
    /// verification per payment; any generator error aborts everything.
    ///
    /// A plan still in a pre-payment status may be rebuilt: its previous
    /// payment rows are hard-deleted before the new batch is inserted. Past
    /// that point payments are never hard-deleted, so a stray second build
    /// fails on the unique indexes instead.
    ///
    /// # Errors
    ///
    /// Returns an error on a missing primary collector, a duplicate
    /// household, or a database failure.
    pub async fn create_payments(
        &self,
        plan_id: Uuid,
        household_ids: &[Uuid],
        mechanism: Option<&DeliveryMechanism>,
    ) -> AppResult<usize> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, None).await?;
        if plan.status.is_pre_payment_plan() {
            delete_plan_payments(&txn, plan_id).await?;
        }
        let rows = fetch_household_rows(&txn, household_ids).await?;

        let new_payments = PaymentGenerator::create_payments(&plan, &rows, mechanism)
            .map_err(|e| generator_err(&e))?;
        insert_payments(&txn, &new_payments).await?;

        let member_map = fetch_member_map(&txn, household_ids).await?;
        aggregator::update_population_counts(
            &mut plan,
            &new_payments,
            &member_map,
            now.date_naive(),
        );
        plan.build_status = Some(BuildStatus::Ok);
        plan.bump_version();

        convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(new_payments.len())
    }

    /// Writes entitlement-formula results back onto a plan's payments and
    /// refreshes the money totals.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown payment or a database failure.
    pub async fn apply_entitlements(
        &self,
        plan_id: Uuid,
        values: &[(Uuid, Decimal)],
    ) -> AppResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, None).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        PaymentGenerator::apply_entitlements(&plan, &mut plan_payments, values)
            .map_err(|e| generator_err(&e))?;
        aggregator::update_money_fields(&mut plan, &plan_payments);
        plan.bump_version();

        write_payments(&txn, payment_models, &plan_payments).await?;
        convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Materializes follow-up payments from the source plan's unsuccessful
    /// rows. Runs as the background task scheduled at follow-up creation.
    ///
    /// # Errors
    ///
    /// Returns an error when the follow-up has no source plan recorded or a
    /// database operation fails.
    pub async fn prepare_follow_up_payments(
        &self,
        follow_up_plan_id: Uuid,
        mechanism: Option<&DeliveryMechanism>,
    ) -> AppResult<usize> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, follow_up_plan_id, None).await?;
        let source_plan_id = plan.source_plan_id.ok_or_else(|| {
            tracing::error!(plan = %plan.code, "follow-up plan has no source plan");
            AppError::DataIntegrity(format!(
                "Follow-up Payment Plan {} has no source plan",
                plan.code
            ))
        })?;
        let (_, source_payments) = fetch_payments(&txn, source_plan_id).await?;

        let withdrawn = fetch_withdrawn_households(&txn, &source_payments).await?;
        let claimed =
            fetch_follow_up_claims(&txn, source_plan_id, Some(follow_up_plan_id)).await?;
        let unsuccessful = PaymentGenerator::unsuccessful_payments_for_follow_up(
            &source_payments,
            &withdrawn,
            &claimed,
        );

        let household_ids: Vec<Uuid> = unsuccessful.iter().map(|p| p.household_id).collect();
        let rows = fetch_household_rows(&txn, &household_ids).await?;
        let rows_by_household: HashMap<Uuid, HouseholdWithCollector> = rows
            .into_iter()
            .map(|row| (row.household.id, row))
            .collect();

        let mut sources = Vec::with_capacity(unsuccessful.len());
        for payment in unsuccessful {
            let row = rows_by_household
                .get(&payment.household_id)
                .ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "Household {} of payment {} is missing",
                        payment.household_id, payment.code
                    ))
                })?
                .clone();
            sources.push((payment.clone(), row));
        }

        let new_payments =
            PaymentGenerator::create_follow_up_payments(&plan, &sources, mechanism)
                .map_err(|e| generator_err(&e))?;
        insert_payments(&txn, &new_payments).await?;

        let member_map = fetch_member_map(&txn, &household_ids).await?;
        aggregator::update_population_counts(
            &mut plan,
            &new_payments,
            &member_map,
            now.date_naive(),
        );
        aggregator::update_money_fields(&mut plan, &new_payments);
        plan.bump_version();

        convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(new_payments.len())
    }
}

/// Hard-deletes a plan's payment rows and their verifications.
///
/// Only legal during a full targeting-level rebuild; the caller checks the
/// plan is still in a pre-payment status.
async fn delete_plan_payments(txn: &DatabaseTransaction, plan_id: Uuid) -> AppResult<()> {
    let payment_ids: Vec<Uuid> = payments::Entity::find()
        .filter(payments::Column::PlanId.eq(plan_id))
        .all(txn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if payment_ids.is_empty() {
        return Ok(());
    }

    payment_verifications::Entity::delete_many()
        .filter(payment_verifications::Column::PaymentId.is_in(payment_ids))
        .exec(txn)
        .await
        .map_err(db_err)?;
    payments::Entity::delete_many()
        .filter(payments::Column::PlanId.eq(plan_id))
        .exec(txn)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Inserts payments plus a pending verification for each.
async fn insert_payments(txn: &DatabaseTransaction, new_payments: &[Payment]) -> AppResult<()> {
    let now = Utc::now().into();
    for payment in new_payments {
        convert::payment_to_insert(payment, now)?
            .insert(txn)
            .await
            .map_err(db_err)?;

        let verification = PaymentVerification::new_pending(payment.id);
        payment_verifications::ActiveModel {
            id: Set(verification.id),
            payment_id: Set(verification.payment_id),
            status: Set(verification.status.as_str().to_string()),
            received_amount: Set(verification.received_amount),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

/// Loads households with their head and primary collector resolved.
async fn fetch_household_rows(
    txn: &DatabaseTransaction,
    household_ids: &[Uuid],
) -> AppResult<Vec<HouseholdWithCollector>> {
    if household_ids.is_empty() {
        return Ok(Vec::new());
    }

    let household_models = households::Entity::find()
        .filter(households::Column::Id.is_in(household_ids.to_vec()))
        .order_by_asc(households::Column::Code)
        .all(txn)
        .await
        .map_err(db_err)?;
    let individual_models = individuals::Entity::find()
        .filter(individuals::Column::HouseholdId.is_in(household_ids.to_vec()))
        .all(txn)
        .await
        .map_err(db_err)?;

    let mut rows = Vec::with_capacity(household_models.len());
    for household_model in &household_models {
        let household = convert::household_from_model(household_model);

        let mut head_of_household_id = None;
        let mut primary_collector = None;
        for individual_model in individual_models
            .iter()
            .filter(|i| i.household_id == household.id)
        {
            if individual_model.is_head_of_household {
                head_of_household_id = Some(individual_model.id);
            }
            if individual_model.is_primary_collector {
                primary_collector = Some(convert::individual_from_model(individual_model)?);
            }
        }

        rows.push(HouseholdWithCollector {
            household,
            head_of_household_id,
            primary_collector,
        });
    }
    Ok(rows)
}

/// Member demographics grouped by household, for the population counts.
async fn fetch_member_map(
    txn: &DatabaseTransaction,
    household_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<MemberDemographics>>> {
    if household_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = individuals::Entity::find()
        .filter(individuals::Column::HouseholdId.is_in(household_ids.to_vec()))
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
