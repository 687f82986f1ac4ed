//! Client Module
//!
//! HTTP client and rate limiting functionality.

pub mod http;
pub mod rate_limiter;

pub use http::{auth_header, auth_headers, join_url, ByteStream, HttpClient, RetryPolicy};
pub use rate_limiter::{RateLimitTracker, ServiceRateLimit};
