//! `SeaORM` Entity for the approval_processes table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_processes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub payment_plan_id: Uuid,
    pub approval_number_required: i32,
    pub authorization_number_required: i32,
    pub finance_release_number_required: i32,
    pub sent_for_approval_by: Uuid,
    pub sent_for_approval_date: DateTimeWithTimeZone,
    pub sent_for_authorization_date: Option<DateTimeWithTimeZone>,
    pub sent_for_finance_release_date: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_plans::Entity",
        from = "Column::PaymentPlanId",
        to = "super::payment_plans::Column::Id"
    )]
    PaymentPlans,
    #[sea_orm(has_many = "super::approvals::Entity")]
    Approvals,
}

impl Related<super::payment_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentPlans.def()
    }
}

impl Related<super::approvals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
