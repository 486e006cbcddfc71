//! Catalog business logic - Foods, workers, plates and depots.
//!
//! These are the reference rows the settlement and maintenance workflows read.
//! [`seed_catalog`] provisions them from `config.toml`.

use crate::{
    config::catalog::CatalogConfig,
    core::plate_state::PlateStatus,
    entities::{Food, Plate, PlateDepot, Worker, food, plate, plate_depot, worker},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Counts of rows inserted by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub foods: usize,
    pub plates: usize,
    pub workers: usize,
    pub depots: usize,
}

/// Creates a menu item priced in cents per 100 grams.
///
/// # Errors
/// Returns an error if the name is empty, the price is negative, or the insert fails.
pub async fn create_food<C>(
    db: &C,
    id: &str,
    name: &str,
    price_per_100g: i64,
    category: Option<String>,
) -> Result<food::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "Food name cannot be empty".to_string(),
        });
    }
    if price_per_100g < 0 {
        return Err(Error::InvalidAmount {
            amount: price_per_100g,
        });
    }

    let now = chrono::Utc::now();
    let food = food::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.trim().to_string()),
        price: Set(price_per_100g),
        category: Set(category),
        description: Set(None),
        is_available: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    food.insert(db).await.map_err(Into::into)
}

/// Finds a food by id.
pub async fn get_food_by_id<C>(db: &C, food_id: &str) -> Result<Option<food::Model>>
where
    C: ConnectionTrait,
{
    Food::find_by_id(food_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Takes a food on or off the menu.
pub async fn set_food_availability(
    db: &DatabaseConnection,
    food_id: &str,
    is_available: bool,
) -> Result<food::Model> {
    let food = get_food_by_id(db, food_id)
        .await?
        .ok_or_else(|| Error::FoodNotFound {
            food_id: food_id.to_string(),
        })?;

    let mut active: food::ActiveModel = food.into();
    active.is_available = Set(is_available);
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Lists the whole menu ordered by name.
pub async fn list_foods(db: &DatabaseConnection) -> Result<Vec<food::Model>> {
    Food::find()
        .order_by_asc(food::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a staff member.
pub async fn create_worker<C>(db: &C, id: &str, name: &str, role: &str) -> Result<worker::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let worker = worker::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        role: Set(role.to_string()),
        phone: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    worker.insert(db).await.map_err(Into::into)
}

/// Registers a new tray; it starts empty, unbound and available.
pub async fn register_plate<C>(db: &C, id: &str, qr_code: &str) -> Result<plate::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let plate = plate::ActiveModel {
        id: Set(id.to_string()),
        qr_code: Set(qr_code.to_string()),
        weight: Set(0.0),
        is_bound: Set(false),
        bound_user_id: Set(None),
        bound_at: Set(None),
        status: Set(PlateStatus::Available.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    plate.insert(db).await.map_err(Into::into)
}

/// Creates a full tray depot.
pub async fn create_depot<C>(
    db: &C,
    id: &str,
    name: &str,
    location: Option<String>,
    capacity: i32,
) -> Result<plate_depot::Model>
where
    C: ConnectionTrait,
{
    if capacity < 0 {
        return Err(Error::InvalidInput {
            message: format!("Depot {id} capacity cannot be negative"),
        });
    }

    let now = chrono::Utc::now();
    let depot = plate_depot::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        location: Set(location),
        capacity: Set(capacity),
        available: Set(capacity),
        created_at: Set(now),
        updated_at: Set(now),
    };
    depot.insert(db).await.map_err(Into::into)
}

/// Inserts every configured row whose id is not in the database yet.
///
/// Existing rows are never modified, so running this on every start is safe.
pub async fn seed_catalog(db: &DatabaseConnection, config: &CatalogConfig) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for entry in &config.foods {
        if Food::find_by_id(entry.id.clone()).one(db).await?.is_none() {
            let created =
                create_food(db, &entry.id, &entry.name, entry.price, entry.category.clone())
                    .await?;
            if !entry.is_available {
                set_food_availability(db, &created.id, false).await?;
            }
            summary.foods += 1;
        }
    }

    for entry in &config.plates {
        if Plate::find_by_id(entry.id.clone()).one(db).await?.is_none() {
            register_plate(db, &entry.id, &entry.qr_code).await?;
            summary.plates += 1;
        }
    }

    for entry in &config.workers {
        if Worker::find_by_id(entry.id.clone()).one(db).await?.is_none() {
            create_worker(db, &entry.id, &entry.name, &entry.role).await?;
            summary.workers += 1;
        }
    }

    for entry in &config.depots {
        if PlateDepot::find_by_id(entry.id.clone()).one(db).await?.is_none() {
            create_depot(
                db,
                &entry.id,
                &entry.name,
                entry.location.clone(),
                entry.capacity,
            )
            .await?;
            summary.depots += 1;
        }
    }

    info!(
        foods = summary.foods,
        plates = summary.plates,
        workers = summary.workers,
        depots = summary.depots,
        "catalog seeded"
    );
    Ok(summary)
}
