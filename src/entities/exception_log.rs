//! Exception log entity - Anomalies reported by staff.
//!
//! `plate_id` is kept as free text: a report may name a tray that cannot be
//! resolved, and the report is still recorded.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Exception log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exception_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub worker_id: String,
    pub plate_id: Option<String>,
    /// What went wrong
    pub exception: String,
    /// What the worker did about it
    pub action: String,
    /// `"pending"` or `"resolved"`
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between ExceptionLog and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::worker::Entity",
        from = "Column::WorkerId",
        to = "super::worker::Column::Id"
    )]
    Worker,
}

impl Related<super::worker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Worker.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
