//! Worker entity - Staff who record exceptions and run reclamation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Worker database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// `"staff"`, `"manager"` or `"gc"`
    pub role: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Worker and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::exception_log::Entity")]
    ExceptionLogs,
}

impl Related<super::exception_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExceptionLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
