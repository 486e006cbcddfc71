//! Shared test utilities for the canteen core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{catalog, plate, user, wallet},
    entities,
    errors::Result,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool holds a single connection: every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database. Concurrent
/// tasks therefore queue for the connection, one transaction at a time.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database served by a pool of up to
/// `max_connections`, so concurrent tasks really hold separate connections.
///
/// The database lives inside the returned directory, which is deleted on drop;
/// keep it alive for as long as the connection is used.
pub async fn setup_file_db(max_connections: u32) -> Result<(DatabaseConnection, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("canteen.sqlite").display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Creates a test user whose username is `user-{id}`.
pub async fn create_test_user(db: &DatabaseConnection, id: &str) -> Result<entities::user::Model> {
    user::create_user(db, id, &format!("user-{id}")).await
}

/// Registers an available, unbound plate with QR code `QR-{id}`.
pub async fn create_test_plate(
    db: &DatabaseConnection,
    id: &str,
) -> Result<entities::plate::Model> {
    catalog::register_plate(db, id, &format!("QR-{id}")).await
}

/// Creates an available food named `food-{id}` priced in cents per 100 g.
pub async fn create_test_food(
    db: &DatabaseConnection,
    id: &str,
    price_per_100g: i64,
) -> Result<entities::food::Model> {
    catalog::create_food(db, id, &format!("food-{id}"), price_per_100g, None).await
}

/// Creates an active worker with role `gc`.
pub async fn create_test_worker(
    db: &DatabaseConnection,
    id: &str,
) -> Result<entities::worker::Model> {
    catalog::create_worker(db, id, &format!("worker-{id}"), "gc").await
}

/// Sets up a database with one user whose wallet holds `cents`.
pub async fn setup_with_funded_user(user_id: &str, cents: i64) -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    create_test_user(&db, user_id).await?;
    wallet::charge(&db, user_id, cents).await?;
    Ok(db)
}

/// Sets up a database where `user_id` holds `plate_id`. No wallet is created.
pub async fn setup_with_bound_plate(user_id: &str, plate_id: &str) -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    create_test_user(&db, user_id).await?;
    create_test_plate(&db, plate_id).await?;
    plate::bind_plate(&db, user_id, plate_id).await?;
    Ok(db)
}
