//! Reconciliation repository: per-FSP workbook import.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use uuid::Uuid;

use aidra_core::plan::{PlanService, PlanStatus};
use aidra_core::reconciliation::{
    FspTemplate, ImportOutcome, ReconciliationImporter,
};
use aidra_shared::AppResult;

use crate::entities::{payment_verifications, payments};

use super::convert;
use super::payment_plan::{fetch_payments, fetch_plan, write_payments};
use super::{db_err, plan_err, reconciliation_err};

/// What an import attempt produced.
///
/// Per-row parse problems land in `errors` and nothing is committed; an
/// empty error list is the signal that the import ran and `outcome` is set.
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// The applied import, when parsing succeeded.
    pub outcome: Option<ImportOutcome>,
    /// Per-row parse errors, in row order.
    pub errors: Vec<String>,
}

/// Reconciliation repository applying delivered-amount workbooks.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Imports a reconciliation workbook against a plan.
    ///
    /// Rows are parsed against the FSP's column template first; any parse
    /// error aborts before the database is touched. The import itself is one
    /// transaction: payments, verifications, and plan totals all move
    /// together, and a fully reconciled accepted plan is finished in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns an error on a business-rule violation (over-delivery, wrong
    /// plan status, unknown payment), a stale version, or a database failure.
    pub async fn import(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        template: &FspTemplate,
        raw_rows: &[Vec<String>],
    ) -> AppResult<ImportReport> {
        let (parsed, errors) = template.parse_rows(raw_rows);
        let Some(rows) = parsed else {
            return Ok(ImportReport {
                outcome: None,
                errors,
            });
        };

        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let payment_ids: Vec<Uuid> = plan_payments.iter().map(|p| p.id).collect();
        let verification_models = payment_verifications::Entity::find()
            .filter(payment_verifications::Column::PaymentId.is_in(payment_ids))
            .all(&txn)
            .await
            .map_err(db_err)?;
        let mut verifications = verification_models
            .iter()
            .map(convert::verification_from_model)
            .collect::<AppResult<Vec<_>>>()?;

        let outcome = ReconciliationImporter::import(
            &mut plan,
            &mut plan_payments,
            &mut verifications,
            &rows,
        )
        .map_err(|e| reconciliation_err(&e))?;

        if outcome.is_reconciled && plan.status == PlanStatus::Accepted {
            PlanService::status_finished(&mut plan, now).map_err(|e| plan_err(&e))?;
        }

        write_payments(&txn, payment_models, &plan_payments).await?;
        let verification_now = now.into();
        for (verification_model, verification) in
            verification_models.into_iter().zip(&verifications)
        {
            convert::apply_verification(verification_model, verification, verification_now)
                .update(&txn)
                .await
                .map_err(db_err)?;
        }
        convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        Ok(ImportReport {
            outcome: Some(outcome),
            errors: Vec::new(),
        })
    }

    /// True once no eligible payment of the plan is still pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_reconciled(&self, plan_id: Uuid) -> AppResult<bool> {
        let pending = payments::Entity::find()
            .filter(payments::Column::PlanId.eq(plan_id))
            .filter(payments::Column::State.eq("ACTIVE"))
            .filter(payments::Column::Status.eq("PENDING"))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(pending.is_none())
    }
}
