//! Failure Reporting
//!
//! Service clients report failed calls to an injected [`Reporter`] instead
//! of a process-wide logger.

use crate::error::ApiError;
use std::fmt;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// A failed call to an external service
#[derive(Debug)]
pub struct ApiFailure<'a> {
    /// Service name, e.g. "Wov" or "Lichess"
    pub service: &'a str,

    /// Human-readable endpoint label, e.g. "User" or "Clan Members"
    pub endpoint: &'a str,

    /// What the call was about, e.g. ("User ID", "42")
    pub subject: Option<(&'a str, &'a str)>,

    pub error: &'a ApiError,
}

impl ApiFailure<'_> {
    /// HTTP status of the failure, 429 for rate limits
    pub fn status(&self) -> Option<u16> {
        self.error.status_code()
    }
}

impl fmt::Display for ApiFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} API call failed", self.service, self.endpoint)?;
        match self.status() {
            Some(status) => write!(f, " with status code {}.", status)?,
            None => write!(f, ". Error: {}.", self.error)?,
        }
        if let Some((key, value)) = self.subject {
            write!(f, " {}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Receives failed API calls
pub trait Reporter: Send + Sync {
    fn report(&self, failure: &ApiFailure<'_>);
}

/// Reports failures as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, failure: &ApiFailure<'_>) {
        error!(
            service = failure.service,
            endpoint = failure.endpoint,
            status = ?failure.status(),
            error = %failure.error,
            "{}",
            failure
        );
    }
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, or `default_filter`
///
/// Meant for binaries; fails if a global subscriber is already set.
pub fn init_logging(default_filter: &str) -> crate::error::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ApiError::Internal(format!("Failed to install logger: {}", e)))
}
