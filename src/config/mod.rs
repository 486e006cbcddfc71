/// Database configuration and connection management
pub mod database;

/// Seed catalog (foods, plates, workers, depots) loaded from config.toml
pub mod catalog;

/// Retry, timeout and idle-release settings from environment variables
pub mod runtime;
