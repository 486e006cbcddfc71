//! Plate depot entity - A tray storage station.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plate depot database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plate_depots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    /// Number of slots in the station
    pub capacity: i32,
    /// Plates currently stored, `0..=capacity`
    pub available: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
