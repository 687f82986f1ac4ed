//! HTTP Client
//!
//! Async HTTP client shared by the service clients, with retry, backoff,
//! and rate limit handling.

use crate::client::rate_limiter::RateLimitTracker;
use crate::config::HttpSettings;
use crate::error::{ApiError, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Byte stream of a response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send>>;

/// Retry behaviour for regulated requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Wait after a 429 without a usable `Retry-After` header
    pub default_retry_after: Duration,

    /// First backoff after a connection error or timeout
    pub initial_interval: Duration,

    /// Backoff ceiling
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_retry_after: Duration::from_secs(60),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Build an `Authorization` header value such as `Bot <token>`
pub fn auth_header(scheme: &str, token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{} {}", scheme, token))
        .map_err(|e| ApiError::Config(format!("Invalid API token format: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Header map carrying only an authorization header
pub fn auth_headers(scheme: &str, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth_header(scheme, token)?);
    Ok(headers)
}

/// HTTP client with retry and rate limit handling
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    rate_limiter: Arc<RateLimitTracker>,
}

impl HttpClient {
    /// Build the pooled client with the configured timeouts
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimitTracker::new()),
        })
    }

    /// Rate limit state shared by every service on this client
    pub fn rate_limiter(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limiter
    }

    /// Single GET attempt, decoding the body as JSON
    ///
    /// A 429 without `Retry-After` blocks `service` for `default_retry_after`.
    pub async fn get_json<Q>(
        &self,
        service: &str,
        url: &str,
        headers: &HeaderMap,
        query: &Q,
        default_retry_after: Duration,
    ) -> Result<serde_json::Value>
    where
        Q: Serialize + ?Sized,
    {
        if let Some(wait) = self.rate_limiter.should_wait(service) {
            debug!(service, wait_ms = wait.as_millis() as u64, "get_json: waiting on rate limit");
            tokio::time::sleep(wait).await;
        }

        debug!(service, url, "get_json: sending");
        let resp = self
            .client
            .get(url)
            .headers(headers.clone())
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        self.rate_limiter.update_from_response(service, resp.headers());

        if RateLimitTracker::is_rate_limit_status(status) {
            let wait = self.rate_limiter.update_from_rate_limit_error(
                service,
                resp.headers(),
                default_retry_after,
            );
            return Err(ApiError::RateLimited {
                service: service.to_string(),
                retry_after: Some(wait.as_secs()),
            });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::status(service, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::Response(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })
    }

    /// GET with retries on 429, connection errors, and timeouts
    ///
    /// A 429 waits for `Retry-After` (or the policy default); transport
    /// errors back off exponentially. Any other non-success status fails
    /// immediately.
    pub async fn get_regulated<Q>(
        &self,
        service: &str,
        url: &str,
        headers: &HeaderMap,
        query: &Q,
        policy: &RetryPolicy,
    ) -> Result<Response>
    where
        Q: Serialize + ?Sized,
    {
        let mut backoff = policy.backoff();
        let mut attempt = 0u32;

        loop {
            if let Some(wait) = self.rate_limiter.should_wait(service) {
                debug!(service, wait_ms = wait.as_millis() as u64, "get_regulated: waiting on rate limit");
                tokio::time::sleep(wait).await;
            }

            let response = self
                .client
                .get(url)
                .headers(headers.clone())
                .query(query)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    self.rate_limiter.update_from_response(service, resp.headers());

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if RateLimitTracker::is_rate_limit_status(status) {
                        let wait = self.rate_limiter.update_from_rate_limit_error(
                            service,
                            resp.headers(),
                            policy.default_retry_after,
                        );
                        attempt += 1;
                        if attempt > policy.max_retries {
                            return Err(ApiError::RateLimited {
                                service: service.to_string(),
                                retry_after: Some(wait.as_secs()),
                            });
                        }
                        warn!(service, attempt, wait_ms = wait.as_millis() as u64, "rate limited, retrying");
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(ApiError::status(service, status, &body));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > policy.max_retries || !(e.is_connect() || e.is_timeout()) {
                        return Err(e.into());
                    }

                    let wait = backoff.next_backoff().unwrap_or(policy.max_interval);
                    warn!(service, attempt, wait_ms = wait.as_millis() as u64, error = %e, "request failed, retrying");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Regulated GET whose body is returned as a byte stream
    pub async fn get_stream<Q>(
        &self,
        service: &str,
        url: &str,
        headers: &HeaderMap,
        query: &Q,
        policy: &RetryPolicy,
    ) -> Result<ByteStream>
    where
        Q: Serialize + ?Sized,
    {
        use async_stream::stream;
        use futures::StreamExt;

        let response = self.get_regulated(service, url, headers, query, policy).await?;

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(ApiError::from);
            }
        };

        Ok(Box::pin(s))
    }
}

/// Join a base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
