//! Ratecall
//!
//! Async clients for the Wolvesville and Lichess APIs, and a rate-limited
//! task queue that runs calls one at a time with a cooldown between them.

use std::sync::Arc;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod report;

pub use api::{ExportOptions, LichessClient, PerfType, WovApiCaller, WovClient};
pub use client::HttpClient;
pub use config::{ConfigLoader, Settings};
pub use error::{ApiError, Result};
pub use queue::{PendingResult, QueueConfig, QueueError, QueueStats, RateLimitedQueue, TaskError};
pub use report::{ApiFailure, Reporter, TracingReporter};

/// Both service clients sharing one HTTP client and reporter
pub struct ApiClients {
    /// Queued Wolvesville calls
    pub wov: WovApiCaller,

    /// Direct Lichess calls; the export retries on its own
    pub lichess: LichessClient,
}

impl ApiClients {
    /// Load `.env` files and config from the default locations, then build
    /// the clients with a `tracing` reporter
    ///
    /// Must be called inside a tokio runtime, since the Wolvesville queue
    /// starts its worker here.
    pub fn new() -> Result<Self> {
        config::load_env();
        let settings = ConfigLoader::new()?.into_settings()?;
        Self::from_settings(&settings, Arc::new(TracingReporter))
    }

    /// Build the clients from already loaded settings
    pub fn from_settings(settings: &Settings, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&settings.http)?);

        let wov = WovClient::new(&settings.wov, Arc::clone(&http), Arc::clone(&reporter))?;
        let lichess = LichessClient::new(&settings.lichess, http, reporter)?;

        Ok(Self {
            wov: WovApiCaller::new(wov, settings.wov.queue_config()),
            lichess,
        })
    }

    /// Finish queued Wolvesville calls and stop the queue
    pub async fn shutdown(&self) -> std::result::Result<QueueStats, QueueError> {
        self.wov.shutdown().await
    }
}
