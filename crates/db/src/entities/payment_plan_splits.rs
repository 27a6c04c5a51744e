//! `SeaORM` Entity for the payment_plan_splits table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_plan_splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub plan_id: Uuid,
    pub split_type: String,
    pub chunk_size: Option<i32>,
    pub order_index: i32,
    pub sent_to_payment_gateway: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_plans::Entity",
        from = "Column::PlanId",
        to = "super::payment_plans::Column::Id"
    )]
    PaymentPlans,
    #[sea_orm(has_many = "super::split_payments::Entity")]
    SplitPayments,
}

impl Related<super::payment_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentPlans.def()
    }
}

impl Related<super::split_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SplitPayments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
