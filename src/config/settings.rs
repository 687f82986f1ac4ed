//! Settings
//!
//! Configuration schema for the HTTP layer and both services.

use crate::client::RetryPolicy;
use crate::queue::QueueConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub wov: WovSettings,
    pub lichess: LichessSettings,
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Total request timeout in seconds
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    pub pool_max_idle_per_host: usize,

    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 10,
            user_agent: concat!("ratecall/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Wolvesville API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WovSettings {
    pub base_url: String,

    /// Environment variable holding the bot token
    pub token_env: String,

    /// Pause between queued calls, in milliseconds
    pub cooldown_ms: u64,

    /// Wait after a 429 without `Retry-After`, in seconds
    pub default_retry_after_secs: u64,
}

impl Default for WovSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.wolvesville.com/".to_string(),
            token_env: "WOV_API_TOKEN".to_string(),
            cooldown_ms: 1000,
            default_retry_after_secs: 60,
        }
    }
}

impl WovSettings {
    /// The bot token, if its environment variable is set and non-empty
    pub fn token(&self) -> Option<String> {
        read_token(&self.token_env)
    }

    /// Queue named `wov` with the configured cooldown
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new("wov", Duration::from_millis(self.cooldown_ms))
    }

    /// Wait after a 429 that has no `Retry-After`
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

/// Lichess API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessSettings {
    pub base_url: String,

    /// Environment variable holding the personal API token
    pub token_env: String,

    /// Retries for the game export
    pub max_retries: u32,

    /// Wait after a 429 without `Retry-After`, in seconds
    pub default_retry_after_secs: u64,
}

impl Default for LichessSettings {
    fn default() -> Self {
        Self {
            base_url: "https://lichess.org/api/".to_string(),
            token_env: "LI_API_TOKEN".to_string(),
            max_retries: 3,
            default_retry_after_secs: 60,
        }
    }
}

impl LichessSettings {
    /// The personal API token, if set
    pub fn token(&self) -> Option<String> {
        read_token(&self.token_env)
    }

    /// Retry policy for the regulated export
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
            ..Default::default()
        }
    }
}

fn read_token(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
