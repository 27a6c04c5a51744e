//! `SeaORM` Entity for the approvals table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approvals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub approval_process_id: Uuid,
    pub approval_type: String,
    pub created_by: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::approval_processes::Entity",
        from = "Column::ApprovalProcessId",
        to = "super::approval_processes::Column::Id"
    )]
    ApprovalProcesses,
}

impl Related<super::approval_processes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalProcesses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
