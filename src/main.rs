use canteen::{
    config::{catalog, database, runtime::RuntimeSettings},
    core::context::OpContext,
    errors::Result,
    service::CanteenService,
};
use dotenvy::dotenv;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    // 3. Runtime settings
    let settings = RuntimeSettings::from_env()
        .inspect_err(|e| error!("Invalid runtime settings: {}", e))?;

    // 4. Connect and ensure the schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let service = CanteenService::from_settings(db, &settings);
    let ctx = OpContext::new();
    service.health_check(&ctx).await?;

    // 5. Seed the catalog when a config.toml is present
    if Path::new("config.toml").exists() {
        let config = catalog::load_default_config()?;
        let seeded = service
            .seed_catalog(&ctx, &config)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
        info!(?seeded, "catalog loaded from config.toml");
    } else {
        info!("no config.toml found, skipping catalog seed");
    }

    // 6. One idle-binding sweep
    let released = service.release_idle_bindings(&ctx).await?;
    info!(released = released.len(), "idle bindings swept");

    // 7. Summary
    let plates = service.get_plate_list(&ctx, None).await?;
    let bound = plates.iter().filter(|p| p.is_bound).count();
    info!(plates = plates.len(), bound, "plate summary");

    Ok(())
}
