//! Plate business logic - Binding trays to users and reading plate state.
//!
//! A plate's binding fields (`is_bound`, `bound_user_id`, `bound_at`) and its
//! status are only written through [`write_plate`], which takes the row as it
//! was read inside the current transaction, asks the state machine for the next
//! status, and issues an `UPDATE` guarded on that row's previous binding and
//! status. A guard miss means another writer got there first and surfaces as
//! [`Error::Conflict`].

use crate::{
    core::{
        plate_state::{PlateEvent, PlateStatus},
        retry::expect_single_row,
        store::begin_write,
        user::require_user,
    },
    entities::{Plate, plate},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*, sea_query::Expr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a plate write does to the binding fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindingChange {
    Keep,
    BindTo(String),
    Clear,
}

/// Applies `event` to `current` and persists the result.
///
/// `current` must have been read on the same connection or transaction.
pub(crate) async fn write_plate<C>(
    db: &C,
    current: &plate::Model,
    event: PlateEvent,
    binding: BindingChange,
    clear_weight: bool,
) -> Result<plate::Model>
where
    C: ConnectionTrait,
{
    let from = PlateStatus::from_column(&current.status, &current.id)?;
    let next = from.apply(event, &current.id)?;
    let now = Utc::now();

    let mut update = Plate::update_many()
        .col_expr(plate::Column::Status, Expr::value(next.to_string()))
        .col_expr(plate::Column::UpdatedAt, Expr::value(now));

    update = match binding {
        BindingChange::Keep => update,
        BindingChange::BindTo(user_id) => update
            .col_expr(plate::Column::IsBound, Expr::value(true))
            .col_expr(plate::Column::BoundUserId, Expr::value(Some(user_id)))
            .col_expr(plate::Column::BoundAt, Expr::value(Some(now))),
        BindingChange::Clear => update
            .col_expr(plate::Column::IsBound, Expr::value(false))
            .col_expr(plate::Column::BoundUserId, Expr::value(Option::<String>::None))
            .col_expr(
                plate::Column::BoundAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            ),
    };
    if clear_weight {
        update = update.col_expr(plate::Column::Weight, Expr::value(0.0_f64));
    }

    let holder_guard = match &current.bound_user_id {
        Some(user_id) => plate::Column::BoundUserId.eq(user_id.clone()),
        None => plate::Column::BoundUserId.is_null(),
    };
    let result = update
        .filter(plate::Column::Id.eq(current.id.clone()))
        .filter(plate::Column::Status.eq(current.status.clone()))
        .filter(plate::Column::IsBound.eq(current.is_bound))
        .filter(holder_guard)
        .exec(db)
        .await?;
    expect_single_row(result.rows_affected, &format!("plate {}", current.id))?;

    require_plate(db, &current.id).await
}

/// Fails with [`Error::PlateNotFound`] unless the plate exists.
pub(crate) async fn require_plate<C>(db: &C, plate_id: &str) -> Result<plate::Model>
where
    C: ConnectionTrait,
{
    Plate::find_by_id(plate_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::PlateNotFound {
            plate_id: plate_id.to_string(),
        })
}

/// Binds `plate_id` to `user_id`, releasing any other plate the user holds.
///
/// Runs on `db` without opening a transaction of its own.
pub async fn bind_plate_in<C>(db: &C, user_id: &str, plate_id: &str) -> Result<plate::Model>
where
    C: ConnectionTrait,
{
    require_user(db, user_id).await?;
    let plate = require_plate(db, plate_id).await?;

    if plate.is_bound && plate.bound_user_id.as_deref() != Some(user_id) {
        return Err(Error::PlateAlreadyBound {
            plate_id: plate_id.to_string(),
        });
    }
    // Refuse out-of-pool plates before touching the user's other bindings
    PlateStatus::from_column(&plate.status, plate_id)?.apply(PlateEvent::Bind, plate_id)?;

    let previous = Plate::find()
        .filter(plate::Column::BoundUserId.eq(user_id))
        .filter(plate::Column::Id.ne(plate_id))
        .all(db)
        .await?;
    for held in &previous {
        write_plate(db, held, PlateEvent::Unbind, BindingChange::Clear, false).await?;
        debug!(user_id, plate_id = %held.id, "released previous binding");
    }

    write_plate(
        db,
        &plate,
        PlateEvent::Bind,
        BindingChange::BindTo(user_id.to_string()),
        false,
    )
    .await
}

/// Binds a plate to a user as one atomic unit.
///
/// # Errors
/// - [`Error::UserNotFound`] / [`Error::PlateNotFound`] if either is missing
/// - [`Error::PlateAlreadyBound`] if another user holds the plate
/// - [`Error::PlateUnavailable`] if the plate is in maintenance or cleaning
pub async fn bind_plate(
    db: &DatabaseConnection,
    user_id: &str,
    plate_id: &str,
) -> Result<plate::Model> {
    let txn = begin_write(db).await?;
    let plate = bind_plate_in(&txn, user_id, plate_id).await?;
    txn.commit().await?;

    info!(user_id, plate_id, "plate bound");
    Ok(plate)
}

/// Releases a plate held by `user_id`.
///
/// Runs on `db` without opening a transaction of its own.
pub async fn unbind_plate_in<C>(db: &C, user_id: &str, plate_id: &str) -> Result<plate::Model>
where
    C: ConnectionTrait,
{
    let plate = require_plate(db, plate_id).await?;
    if !plate.is_bound || plate.bound_user_id.as_deref() != Some(user_id) {
        return Err(Error::NotBound {
            plate_id: plate_id.to_string(),
            user_id: user_id.to_string(),
        });
    }

    write_plate(db, &plate, PlateEvent::Unbind, BindingChange::Clear, false).await
}

/// Unbinds a plate as one atomic unit.
///
/// # Errors
/// - [`Error::PlateNotFound`] if the plate is missing
/// - [`Error::NotBound`] if the plate is not bound to exactly this user
pub async fn unbind_plate(
    db: &DatabaseConnection,
    user_id: &str,
    plate_id: &str,
) -> Result<plate::Model> {
    let txn = begin_write(db).await?;
    let plate = unbind_plate_in(&txn, user_id, plate_id).await?;
    txn.commit().await?;

    info!(user_id, plate_id, "plate unbound");
    Ok(plate)
}

/// Loads one plate.
pub async fn get_plate_info(db: &DatabaseConnection, plate_id: &str) -> Result<plate::Model> {
    require_plate(db, plate_id).await
}

/// Lists plates ordered by id, optionally only those with the given binding flag.
pub async fn get_plate_list(
    db: &DatabaseConnection,
    is_bound: Option<bool>,
) -> Result<Vec<plate::Model>> {
    let mut query = Plate::find().order_by_asc(plate::Column::Id);
    if let Some(is_bound) = is_bound {
        query = query.filter(plate::Column::IsBound.eq(is_bound));
    }
    query.all(db).await.map_err(Into::into)
}

/// Unbinds every plate bound before `cutoff`, each in its own transaction.
///
/// Returns the ids of the released plates. A plate whose binding changed since
/// the scan is skipped.
pub async fn release_bindings_older_than(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>> {
    let candidates = Plate::find()
        .filter(plate::Column::IsBound.eq(true))
        .filter(plate::Column::BoundAt.lt(cutoff))
        .order_by_asc(plate::Column::Id)
        .all(db)
        .await?;

    let mut released = Vec::new();
    for candidate in candidates {
        let txn = begin_write(db).await?;
        let plate = require_plate(&txn, &candidate.id).await?;
        let still_idle = plate.is_bound
            && plate.bound_user_id == candidate.bound_user_id
            && plate.bound_at.is_some_and(|bound_at| bound_at < cutoff);
        if !still_idle {
            continue;
        }

        match write_plate(&txn, &plate, PlateEvent::Unbind, BindingChange::Clear, false).await {
            Ok(_) => {
                txn.commit().await?;
                released.push(plate.id);
            }
            Err(err) if err.is_transient() => {
                warn!(plate_id = %plate.id, error = %err, "idle release skipped");
            }
            Err(err) => return Err(err),
        }
    }

    if !released.is_empty() {
        info!(count = released.len(), "released idle plate bindings");
    }
    Ok(released)
}

/// Unbinds plates that have been bound for longer than `idle_for`.
pub async fn release_idle_bindings(
    db: &DatabaseConnection,
    idle_for: Duration,
) -> Result<Vec<String>> {
    let idle_for = chrono::Duration::from_std(idle_for).map_err(|err| Error::Config {
        message: format!("Invalid idle unbind interval: {err}"),
    })?;
    let cutoff = Utc::now()
        .checked_sub_signed(idle_for)
        .ok_or_else(|| Error::Config {
            message: format!("Idle unbind interval of {idle_for} reaches before the earliest date"),
        })?;
    release_bindings_older_than(db, cutoff).await
}
