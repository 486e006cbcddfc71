//! Food entity - A menu item priced per 100 grams.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Food database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "foods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// Price in cents per 100 grams
    pub price: i64,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Whether the item can currently be ordered
    pub is_available: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Food has no navigable relationships from this side
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
