//! Ratecall Error Types
//!
//! Error handling for the service clients and the HTTP layer.

use crate::queue::TaskError;
use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for API operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// Configuration errors (invalid JSON, missing tokens, bad header values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service answered with a non-success status
    #[error("{service} responded with status {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    /// Rate limit exceeded and retries exhausted
    #[error("Rate limited by '{service}'{}", retry_hint(.retry_after))]
    RateLimited {
        service: String,
        retry_after: Option<u64>,
    },

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    Request(String),

    /// Response body could not be read or parsed
    #[error("Response error: {0}")]
    Response(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Rejected game export options
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The task queue stopped before the call could run
    #[error("Task queue stopped before the call ran")]
    QueueStopped,

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(seconds) => format!(", retry after {} seconds", seconds),
        None => String::new(),
    }
}

impl ApiError {
    /// Build a status error, keeping at most 500 characters of the body
    pub fn status(service: &str, status: StatusCode, body: &str) -> Self {
        ApiError::Status {
            service: service.to_string(),
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_connect() {
            ApiError::Request(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ApiError::Response(format!("Failed to decode response: {}", err))
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Config(format!("IO error: {}", err))
    }
}

impl From<TaskError<ApiError>> for ApiError {
    fn from(err: TaskError<ApiError>) -> Self {
        match err {
            TaskError::Failed(inner) => inner,
            TaskError::Panicked(msg) => ApiError::Internal(format!("queued call panicked: {}", msg)),
            TaskError::Abandoned => ApiError::QueueStopped,
        }
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
