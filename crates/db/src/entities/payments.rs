//! `SeaORM` Entity for the payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub plan_id: Uuid,
    pub household_id: Uuid,
    pub head_of_household_id: Option<Uuid>,
    pub collector_id: Uuid,
    pub status: String,
    pub state: String,
    pub state_reason: Option<String>,
    pub currency: String,
    pub entitlement_quantity: Option<Decimal>,
    pub entitlement_quantity_usd: Option<Decimal>,
    pub delivered_quantity: Option<Decimal>,
    pub delivered_quantity_usd: Option<Decimal>,
    pub delivery_date: Option<DateTimeWithTimeZone>,
    pub fsp_id: Option<Uuid>,
    pub delivery_mechanism: Option<String>,
    pub has_valid_wallet: bool,
    pub signature: Option<String>,
    pub snapshot: Option<Json>,
    pub source_payment_id: Option<Uuid>,
    pub split_id: Option<Uuid>,
    pub fsp_auth_code: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_plans::Entity",
        from = "Column::PlanId",
        to = "super::payment_plans::Column::Id"
    )]
    PaymentPlans,
    #[sea_orm(
        belongs_to = "super::households::Entity",
        from = "Column::HouseholdId",
        to = "super::households::Column::Id"
    )]
    Households,
    #[sea_orm(has_many = "super::payment_verifications::Entity")]
    PaymentVerifications,
}

impl Related<super::payment_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentPlans.def()
    }
}

impl Related<super::households::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Households.def()
    }
}

impl Related<super::payment_verifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentVerifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
