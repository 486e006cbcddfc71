//! Seed catalog loading from config.toml
//!
//! The catalog lists the foods, plates, workers and depots a fresh database
//! should start with. Seeding is idempotent: rows whose id already exists are
//! left untouched.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub foods: Vec<FoodConfig>,
    #[serde(default)]
    pub plates: Vec<PlateConfig>,
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
    #[serde(default)]
    pub depots: Vec<DepotConfig>,
}

/// A menu item
#[derive(Debug, Deserialize, Clone)]
pub struct FoodConfig {
    pub id: String,
    pub name: String,
    /// Price in cents per 100 grams
    pub price: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// A physical tray
#[derive(Debug, Deserialize, Clone)]
pub struct PlateConfig {
    pub id: String,
    pub qr_code: String,
}

/// A staff member
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub id: String,
    pub name: String,
    /// `"staff"`, `"manager"` or `"gc"`
    pub role: String,
}

/// A tray storage station
#[derive(Debug, Deserialize, Clone)]
pub struct DepotConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
}

const fn default_true() -> bool {
    true
}

const fn default_capacity() -> i32 {
    100
}

/// Loads the catalog from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or
/// required fields are missing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the catalog from the default location (./config.toml)
pub fn load_default_config() -> Result<CatalogConfig> {
    load_config("config.toml")
}
