//! Transaction entity - Append-only wallet ledger.
//!
//! Each row records one balance-affecting event: its signed `amount` and the
//! wallet balance right after it was applied (`balance_after`). Rows are never
//! updated or deleted, and their `id` order is their creation order.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet this entry belongs to
    pub wallet_id: i64,
    /// `"charge"`, `"consume"` or `"refund"`
    pub transaction_type: String,
    /// Signed amount in cents (negative for consumption)
    pub amount: i64,
    /// Wallet balance in cents immediately after this entry
    pub balance_after: i64,
    /// Order this entry settles or refunds, if any
    pub order_id: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
