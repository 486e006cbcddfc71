//! Plate entity - A physical tray that can be bound to one user at a time.
//!
//! `is_bound`, `bound_user_id` and `bound_at` are always set or cleared
//! together. `status` holds a [`PlateStatus`](crate::core::plate_state::PlateStatus)
//! in its snake_case form and is only written through the plate state machine.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plate database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Printed QR code, unique per tray
    #[sea_orm(unique)]
    pub qr_code: String,
    /// Current load in grams
    pub weight: f64,
    pub is_bound: bool,
    pub bound_user_id: Option<String>,
    pub bound_at: Option<DateTimeUtc>,
    /// `"available"`, `"in_use"`, `"cleaning"` or `"maintenance"`
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Plate and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A bound plate points at its user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BoundUserId",
        to = "super::user::Column::Id"
    )]
    BoundUser,
    /// One plate carries many orders over its life
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BoundUser.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
