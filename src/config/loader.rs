//! Configuration Loader
//!
//! Loads settings from built-in defaults and layered JSON files, and loads
//! `.env` files so tokens can be read from the environment.

use crate::config::settings::Settings;
use crate::error::{ApiError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    value: Value,
}

impl ConfigLoader {
    /// Load built-in defaults, then every config file found in the default
    /// locations
    pub fn new() -> Result<Self> {
        let mut loader = Self::builtin()?;

        for path in Self::get_config_paths() {
            if path.exists() {
                loader.load_from_file(&path)?;
            }
        }

        Ok(loader)
    }

    /// Load built-in defaults, then one specific file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::builtin()?;
        loader.load_from_file(path)?;
        Ok(loader)
    }

    fn builtin() -> Result<Self> {
        let defaults = include_str!("../../defaults.json");
        let value: Value = serde_json::from_str(defaults)
            .map_err(|e| ApiError::Config(format!("Failed to parse built-in defaults.json: {}", e)))?;
        Ok(Self { value })
    }

    /// Config paths in the order they are applied
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ratecall").join("config.json"));
        }

        paths.push(PathBuf::from("ratecall.json"));

        // explicit path wins
        if let Ok(custom_path) = std::env::var("RATECALL_CONFIG_PATH") {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| ApiError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "load_from_file: merging config");
        self.merge(value);
        Ok(())
    }

    /// Merge another layer into this one; later layers override per key
    fn merge(&mut self, other: Value) {
        merge_values(&mut self.value, other);
    }

    /// Deserialize the merged layers
    pub fn settings(&self) -> Result<Settings> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| ApiError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Like [`settings`](Self::settings), consuming the loader
    pub fn into_settings(self) -> Result<Settings> {
        serde_json::from_value(self.value)
            .map_err(|e| ApiError::Config(format!("Invalid configuration: {}", e)))
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Load `.env` files: `creds/.env` first, then `.env`
///
/// Variables already set are never overwritten. Returns the files that were
/// found.
pub fn load_env() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    if let Ok(path) = dotenvy::from_path("creds/.env").map(|_| PathBuf::from("creds/.env")) {
        loaded.push(path);
    }
    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }

    debug!(?loaded, "load_env: done");
    loaded
}
