//! GC process log entity - One reclamation run on a plate.
//!
//! The status only moves forward (`pending` → `processing` → `completed`). A
//! row left at `processing` marks a run whose plate update did not persist.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// GC process log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gc_process_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub plate_id: String,
    /// `"plate"` or `"food_waste"`
    pub gc_type: String,
    /// `"pending"`, `"processing"` or `"completed"`
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between GcProcessLog and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plate::Entity",
        from = "Column::PlateId",
        to = "super::plate::Column::Id"
    )]
    Plate,
}

impl Related<super::plate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
