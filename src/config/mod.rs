//! Configuration Module
//!
//! Handles settings loading and the environment.

pub mod loader;
pub mod settings;

pub use loader::{load_env, ConfigLoader};
pub use settings::{HttpSettings, LichessSettings, Settings, WovSettings};
