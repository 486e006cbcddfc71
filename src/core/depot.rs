//! Plate depot business logic - Checking trays out of and back into a station.

use crate::{
    core::{retry::expect_single_row, store::begin_write},
    entities::{PlateDepot, plate_depot},
    errors::{Error, Result},
};
use sea_orm::{prelude::*, sea_query::Expr};
use tracing::info;

async fn require_depot<C>(db: &C, depot_id: &str) -> Result<plate_depot::Model>
where
    C: ConnectionTrait,
{
    PlateDepot::find_by_id(depot_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::DepotNotFound {
            depot_id: depot_id.to_string(),
        })
}

/// Loads one depot.
pub async fn get_plate_depot(db: &DatabaseConnection, depot_id: &str) -> Result<plate_depot::Model> {
    require_depot(db, depot_id).await
}

/// Shifts `available` by `delta`, keeping it within `0..=capacity` in the same
/// statement.
async fn shift_available(
    db: &DatabaseConnection,
    depot_id: &str,
    delta: i32,
) -> Result<plate_depot::Model> {
    let txn = begin_write(db).await?;
    let depot = require_depot(&txn, depot_id).await?;

    let mut update = PlateDepot::update_many()
        .col_expr(
            plate_depot::Column::Available,
            Expr::col(plate_depot::Column::Available).add(delta),
        )
        .col_expr(plate_depot::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(plate_depot::Column::Id.eq(depot_id));
    if delta < 0 {
        if depot.available < -delta {
            return Err(Error::DepotEmpty {
                depot_id: depot_id.to_string(),
            });
        }
        update = update.filter(plate_depot::Column::Available.gte(-delta));
    } else {
        if depot.available + delta > depot.capacity {
            return Err(Error::DepotFull {
                depot_id: depot_id.to_string(),
            });
        }
        update = update.filter(
            Expr::col(plate_depot::Column::Available)
                .lte(Expr::col(plate_depot::Column::Capacity).sub(delta)),
        );
    }

    let result = update.exec(&txn).await?;
    expect_single_row(result.rows_affected, &format!("depot {depot_id}"))?;
    let depot = require_depot(&txn, depot_id).await?;
    txn.commit().await?;

    info!(
        depot_id,
        available = depot.available,
        capacity = depot.capacity,
        "depot stock changed"
    );
    Ok(depot)
}

/// Takes one tray out of a depot.
///
/// # Errors
/// - [`Error::DepotNotFound`] if the depot does not exist
/// - [`Error::DepotEmpty`] if no tray is available
pub async fn checkout_from_depot(
    db: &DatabaseConnection,
    depot_id: &str,
) -> Result<plate_depot::Model> {
    shift_available(db, depot_id, -1).await
}

/// Puts one tray back into a depot.
///
/// # Errors
/// - [`Error::DepotNotFound`] if the depot does not exist
/// - [`Error::DepotFull`] if the depot is at capacity
pub async fn return_to_depot(db: &DatabaseConnection, depot_id: &str) -> Result<plate_depot::Model> {
    shift_available(db, depot_id, 1).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::create_depot;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_checkout_until_empty() -> Result<()> {
        let db = setup_test_db().await?;
        create_depot(&db, "d1", "North", None, 2).await?;

        assert_eq!(checkout_from_depot(&db, "d1").await?.available, 1);
        assert_eq!(checkout_from_depot(&db, "d1").await?.available, 0);
        assert!(matches!(
            checkout_from_depot(&db, "d1").await,
            Err(Error::DepotEmpty { .. })
        ));
        assert_eq!(get_plate_depot(&db, "d1").await?.available, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_return_until_full() -> Result<()> {
        let db = setup_test_db().await?;
        create_depot(&db, "d1", "North", Some("hall B".to_string()), 3).await?;
        checkout_from_depot(&db, "d1").await?;

        assert_eq!(return_to_depot(&db, "d1").await?.available, 3);
        assert!(matches!(
            return_to_depot(&db, "d1").await,
            Err(Error::DepotFull { .. })
        ));

        let depot = get_plate_depot(&db, "d1").await?;
        assert_eq!(depot.available, depot.capacity);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_depot() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(matches!(
            get_plate_depot(&db, "nope").await,
            Err(Error::DepotNotFound { .. })
        ));
        assert!(matches!(
            checkout_from_depot(&db, "nope").await,
            Err(Error::DepotNotFound { .. })
        ));

        Ok(())
    }
}
