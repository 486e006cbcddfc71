//! Order business logic - Settlement, order history and order lifecycle.
//!
//! [`create_order`] is the settlement pipeline: it checks the caller holds the
//! plate, prices every line at the food's current unit price, and then writes
//! the order, its items, the wallet debit with its ledger entry and the flip to
//! `paid` in one database transaction. Any failure drops the transaction, so no
//! part of a failed settlement is ever visible.

use crate::{
    core::{
        pricing::{cents_to_decimal, effective_weight, line_price},
        retry::expect_single_row,
        store::begin_write,
        wallet::{debit_in, find_wallet, refund_in},
    },
    entities::{Food, Order, OrderItem, Plate, order, order_item},
    errors::{Error, Result},
};
use sea_orm::{
    DbErr, PaginatorTrait, QueryOrder, Set, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info};
use uuid::Uuid;

/// Default page size when the caller asks for less than one row per page.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Lifecycle of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order may move from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Paid) | (Self::Paid, Self::Completed | Self::Cancelled)
        )
    }

    fn from_column(value: &str, order_id: &str) -> Result<Self> {
        value.parse().map_err(|_| {
            Error::Database(DbErr::Type(format!(
                "order {order_id} has unknown status {value:?}"
            )))
        })
    }
}

/// One requested line: a food and the weight taken, in grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub food_id: String,
    /// Zero or negative means a default 100 g portion
    pub weight: f64,
}

impl OrderLine {
    pub fn new(food_id: impl Into<String>, weight: f64) -> Self {
        Self {
            food_id: food_id.into(),
            weight,
        }
    }
}

/// An order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

struct PricedLine {
    food_id: String,
    food_name: String,
    weight: f64,
    unit_price: i64,
    price: i64,
}

async fn price_lines<C>(db: &C, lines: &[OrderLine]) -> Result<(Vec<PricedLine>, i64)>
where
    C: ConnectionTrait,
{
    let mut priced = Vec::with_capacity(lines.len());
    let mut total: i64 = 0;

    for line in lines {
        let food = Food::find_by_id(line.food_id.clone())
            .one(db)
            .await?
            .ok_or_else(|| Error::FoodNotFound {
                food_id: line.food_id.clone(),
            })?;
        if !food.is_available {
            return Err(Error::FoodUnavailable {
                food_id: food.id,
                name: food.name,
            });
        }

        let weight = effective_weight(line.weight)?;
        let price = line_price(food.price, weight)?;
        total = total
            .checked_add(price)
            .ok_or(Error::InvalidAmount { amount: price })?;

        priced.push(PricedLine {
            food_id: food.id,
            food_name: food.name,
            weight,
            unit_price: food.price,
            price,
        });
    }

    Ok((priced, total))
}

async fn require_order<C>(db: &C, order_id: &str) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            order_id: order_id.to_string(),
        })
}

async fn load_items<C>(db: &C, order_id: &str) -> Result<Vec<order_item::Model>>
where
    C: ConnectionTrait,
{
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves an order to `to`, guarded on the status it was read with.
async fn transition_order<C>(db: &C, order: &order::Model, to: OrderStatus) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let from = OrderStatus::from_column(&order.status, &order.id)?;
    if !from.can_transition_to(to) {
        return Err(Error::InvalidOrderTransition {
            order_id: order.id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(to.to_string()))
        .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(order::Column::Id.eq(order.id.clone()))
        .filter(order::Column::Status.eq(order.status.clone()))
        .exec(db)
        .await?;
    expect_single_row(result.rows_affected, &format!("order {}", order.id))?;

    require_order(db, &order.id).await
}

/// Settles an order on `db` without opening a transaction of its own.
pub async fn create_order_in<C>(
    db: &C,
    user_id: &str,
    plate_id: &str,
    lines: &[OrderLine],
) -> Result<OrderWithItems>
where
    C: ConnectionTrait,
{
    if lines.is_empty() {
        return Err(Error::EmptyOrder);
    }

    // an unknown plate is one the caller does not hold
    let plate = Plate::find_by_id(plate_id.to_string()).one(db).await?;
    let held = plate.is_some_and(|p| p.is_bound && p.bound_user_id.as_deref() == Some(user_id));
    if !held {
        return Err(Error::PlateBindingMismatch {
            plate_id: plate_id.to_string(),
            user_id: user_id.to_string(),
        });
    }

    let wallet = find_wallet(db, user_id)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            user_id: user_id.to_string(),
        })?;

    let (priced, total) = price_lines(db, lines).await?;
    if wallet.balance < total {
        return Err(Error::InsufficientFunds {
            current: cents_to_decimal(wallet.balance),
            required: cents_to_decimal(total),
        });
    }

    let now = chrono::Utc::now();
    let order_id = Uuid::new_v4().to_string();
    let pending = order::ActiveModel {
        id: Set(order_id.clone()),
        user_id: Set(user_id.to_string()),
        plate_id: Set(plate_id.to_string()),
        total_price: Set(total),
        status: Set(OrderStatus::Pending.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for line in priced {
        let item = order_item::ActiveModel {
            order_id: Set(order_id.clone()),
            food_id: Set(line.food_id),
            food_name: Set(line.food_name),
            weight: Set(line.weight),
            unit_price: Set(line.unit_price),
            price: Set(line.price),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        items.push(item);
    }

    // A zero-priced order has nothing to debit and leaves no ledger entry
    if total > 0 {
        debit_in(db, user_id, total, &order_id).await?;
    }

    let order = transition_order(db, &pending, OrderStatus::Paid).await?;
    Ok(OrderWithItems { order, items })
}

/// Settles an order as one atomic unit.
///
/// # Errors
/// - [`Error::EmptyOrder`] if `lines` is empty
/// - [`Error::PlateBindingMismatch`] if the plate is not bound to the user
/// - [`Error::WalletNotFound`] if the user has no wallet
/// - [`Error::FoodNotFound`] / [`Error::FoodUnavailable`] for a bad line
/// - [`Error::InsufficientFunds`] if the balance does not cover the total
pub async fn create_order(
    db: &DatabaseConnection,
    user_id: &str,
    plate_id: &str,
    lines: &[OrderLine],
) -> Result<OrderWithItems> {
    let txn = begin_write(db).await?;
    let created = create_order_in(&txn, user_id, plate_id, lines).await?;
    txn.commit().await?;

    info!(
        user_id,
        plate_id,
        order_id = %created.order.id,
        total = created.order.total_price,
        items = created.items.len(),
        "order paid"
    );
    Ok(created)
}

/// Loads one order with its items.
pub async fn get_order_info(db: &DatabaseConnection, order_id: &str) -> Result<OrderWithItems> {
    let order = require_order(db, order_id).await?;
    let items = load_items(db, order_id).await?;
    Ok(OrderWithItems { order, items })
}

/// Pages through a user's orders, newest first.
///
/// `page` is 1-based; a page below 1 is treated as 1 and a page size below 1 as
/// [`DEFAULT_PAGE_SIZE`]. Returns the page and the user's total order count.
pub async fn get_user_orders(
    db: &DatabaseConnection,
    user_id: &str,
    page: u64,
    page_size: u64,
) -> Result<(Vec<OrderWithItems>, u64)> {
    let page = page.max(1);
    let page_size = if page_size < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };

    let paginator = Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(db, page_size);
    let total = paginator.num_items().await?;
    let orders = paginator.fetch_page(page - 1).await?;

    let ids: Vec<String> = orders.iter().map(|o| o.id.clone()).collect();
    let mut items_by_order: HashMap<String, Vec<order_item::Model>> = HashMap::new();
    if !ids.is_empty() {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;
        for item in items {
            items_by_order
                .entry(item.order_id.clone())
                .or_default()
                .push(item);
        }
    }

    let page_rows = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect::<Vec<_>>();

    debug!(user_id, page, page_size, total, "user orders loaded");
    Ok((page_rows, total))
}

/// Marks a paid order as completed.
pub async fn complete_order(db: &DatabaseConnection, order_id: &str) -> Result<OrderWithItems> {
    let txn = begin_write(db).await?;
    let current = require_order(&txn, order_id).await?;
    let order = transition_order(&txn, &current, OrderStatus::Completed).await?;
    let items = load_items(&txn, order_id).await?;
    txn.commit().await?;

    info!(order_id, "order completed");
    Ok(OrderWithItems { order, items })
}

/// Cancels a paid order and refunds its total in the same transaction.
pub async fn cancel_order(db: &DatabaseConnection, order_id: &str) -> Result<OrderWithItems> {
    let txn = begin_write(db).await?;
    let current = require_order(&txn, order_id).await?;
    let order = transition_order(&txn, &current, OrderStatus::Cancelled).await?;
    if order.total_price > 0 {
        refund_in(&txn, &order.user_id, order.total_price, order_id).await?;
    }
    let items = load_items(&txn, order_id).await?;
    txn.commit().await?;

    info!(order_id, refunded = order.total_price, "order cancelled");
    Ok(OrderWithItems { order, items })
}
