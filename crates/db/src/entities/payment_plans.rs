//! `SeaORM` Entity for the payment_plans table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub status: String,
    pub status_date: DateTimeWithTimeZone,
    pub background_action: Option<String>,
    pub build_status: Option<String>,
    pub currency: String,
    pub dispersion_start_date: Option<Date>,
    pub dispersion_end_date: Option<Date>,
    pub exchange_rate: Option<Decimal>,
    pub total_entitled_quantity: Decimal,
    pub total_entitled_quantity_usd: Decimal,
    pub total_delivered_quantity: Decimal,
    pub total_delivered_quantity_usd: Decimal,
    pub total_undelivered_quantity: Decimal,
    pub total_undelivered_quantity_usd: Decimal,
    pub male_children_count: i64,
    pub female_children_count: i64,
    pub male_adults_count: i64,
    pub female_adults_count: i64,
    pub total_households_count: i64,
    pub total_individuals_count: i64,
    pub is_follow_up: bool,
    pub source_plan_id: Option<Uuid>,
    pub program_cycle_id: Uuid,
    pub targeting_criteria_id: Uuid,
    pub fsp_id: Option<Uuid>,
    pub delivery_mechanism: Option<String>,
    pub vulnerability_score_min: Option<Decimal>,
    pub vulnerability_score_max: Option<Decimal>,
    pub excluded_household_ids: Option<String>,
    pub exclusion_reason: Option<String>,
    pub export_file_name: Option<String>,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::program_cycles::Entity",
        from = "Column::ProgramCycleId",
        to = "super::program_cycles::Column::Id"
    )]
    ProgramCycles,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
    #[sea_orm(has_many = "super::payment_plan_splits::Entity")]
    PaymentPlanSplits,
}

impl Related<super::program_cycles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProgramCycles.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::payment_plan_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentPlanSplits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
