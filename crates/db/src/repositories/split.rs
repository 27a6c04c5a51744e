//! Split repository: replaces a plan's split set wholesale.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use aidra_core::split::{PaymentPlanSplit, SplitEngine, SplitType};
use aidra_shared::config::SplitConfig;
use aidra_shared::AppResult;

use crate::entities::{payment_plan_splits, split_payments};

use super::convert;
use super::payment_plan::{fetch_payments, fetch_plan, write_payments};
use super::{db_err, split_err};

/// Split repository partitioning a plan's eligible payments.
#[derive(Debug, Clone)]
pub struct SplitRepository {
    db: DatabaseConnection,
}

impl SplitRepository {
    /// Creates a new split repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Partitions the plan's eligible payments, deleting any previous split
    /// rows (and the per-FSP export file name) before inserting the new set.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty eligible set, an out-of-range chunk
    /// count, too many chunks, a stale version, or a database failure.
    pub async fn split(
        &self,
        plan_id: Uuid,
        expected_version: Option<i64>,
        split_type: SplitType,
        chunk_count: Option<usize>,
        config: &SplitConfig,
    ) -> AppResult<Vec<PaymentPlanSplit>> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();

        let (model, mut plan) = fetch_plan(&txn, plan_id, expected_version).await?;
        let (payment_models, mut plan_payments) = fetch_payments(&txn, plan_id).await?;

        let splits = SplitEngine::split(
            &mut plan,
            &mut plan_payments,
            split_type,
            chunk_count,
            config,
        )
        .map_err(|e| split_err(&e))?;

        // Old split sets are never retained alongside new ones.
        let old_split_ids: Vec<Uuid> = payment_plan_splits::Entity::find()
            .filter(payment_plan_splits::Column::PlanId.eq(plan_id))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        if !old_split_ids.is_empty() {
            split_payments::Entity::delete_many()
                .filter(split_payments::Column::SplitId.is_in(old_split_ids))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            payment_plan_splits::Entity::delete_many()
                .filter(payment_plan_splits::Column::PlanId.eq(plan_id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        for split in &splits {
            payment_plan_splits::ActiveModel {
                id: Set(split.id),
                plan_id: Set(split.plan_id),
                split_type: Set(split.split_type.as_str().to_string()),
                chunk_size: Set(split.chunk_size.and_then(|c| i32::try_from(c).ok())),
                order_index: Set(split.order),
                sent_to_payment_gateway: Set(split.sent_to_payment_gateway),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;

            for (order, payment_id) in split.payment_ids.iter().enumerate() {
                split_payments::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    split_id: Set(split.id),
                    payment_id: Set(*payment_id),
                    order_index: Set(i32::try_from(order).unwrap_or(i32::MAX)),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
            }
        }

        write_payments(&txn, payment_models, &plan_payments).await?;
        convert::apply_plan(model, &plan, now.into())
            .update(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(splits)
    }

    /// Marks one split chunk as handed to the payment gateway.
    ///
    /// # Errors
    ///
    /// Returns an error when the split does not exist or the database
    /// operation fails.
    pub async fn mark_sent_to_gateway(&self, split_id: Uuid) -> AppResult<()> {
        let split = payment_plan_splits::Entity::find_by_id(split_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                aidra_shared::AppError::NotFound(format!("Payment Plan split {split_id}"))
            })?;

        let mut active: payment_plan_splits::ActiveModel = split.into();
        active.sent_to_payment_gateway = Set(true);
        active.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}
