//! Rate Limit Tracking
//!
//! Remembers per-service rate limit state from response headers so the next
//! request can wait instead of being rejected.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Longest wait taken from a server header
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Tracks rate limit status for services
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    services: RwLock<HashMap<String, ServiceRateLimit>>,
}

/// Rate limit info for a single service
#[derive(Debug, Clone, Default)]
pub struct ServiceRateLimit {
    /// Remaining requests in the current window
    pub requests_remaining: Option<u32>,

    /// When the current window resets
    pub reset_at: Option<Instant>,

    /// Set by a 429; no requests before this instant
    pub blocked_until: Option<Instant>,
}

impl RateLimitTracker {
    /// Tracker with no recorded state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the window headers of any response
    pub fn update_from_response(&self, service: &str, headers: &HeaderMap) {
        let remaining = header_str(headers, REMAINING_HEADER).and_then(|s| s.parse::<u32>().ok());
        let reset = header_str(headers, RESET_HEADER).and_then(|s| s.parse::<u64>().ok());

        if remaining.is_none() && reset.is_none() {
            return;
        }

        let mut services = self.services.write();
        let info = services.entry(service.to_string()).or_default();
        if remaining.is_some() {
            info.requests_remaining = remaining;
        }
        if let Some(secs) = reset {
            info.reset_at = Some(deadline(Duration::from_secs(secs)));
        }
    }

    /// Record a 429 and return how long to back off
    ///
    /// Uses `Retry-After` (seconds or HTTP date) when present, else `default`.
    pub fn update_from_rate_limit_error(
        &self,
        service: &str,
        headers: &HeaderMap,
        default: Duration,
    ) -> Duration {
        let wait = header_str(headers, RETRY_AFTER.as_str())
            .and_then(parse_retry_after)
            .unwrap_or(default)
            .min(MAX_WAIT);

        let mut services = self.services.write();
        let info = services.entry(service.to_string()).or_default();
        info.blocked_until = Some(deadline(wait));

        wait
    }

    /// How long to wait before the next request to `service`, if at all
    pub fn should_wait(&self, service: &str) -> Option<Duration> {
        let services = self.services.read();
        let info = services.get(service)?;
        let now = Instant::now();

        if let Some(until) = info.blocked_until {
            if now < until {
                return Some(until - now);
            }
        }

        if info.requests_remaining == Some(0) {
            if let Some(reset_at) = info.reset_at {
                if now < reset_at {
                    return Some(reset_at - now);
                }
            }
        }

        None
    }

    /// Current state for a service
    pub fn get(&self, service: &str) -> Option<ServiceRateLimit> {
        self.services.read().get(service).cloned()
    }

    /// Forget everything recorded for `service`
    pub fn clear(&self, service: &str) {
        self.services.write().remove(service);
    }

    /// Whether `status` is 429 Too Many Requests
    pub fn is_rate_limit_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// `now + wait`, with `wait` capped at [`MAX_WAIT`]
fn deadline(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait.min(MAX_WAIT)).unwrap_or(now)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Parse a `Retry-After` value: delay in seconds, or an HTTP date
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    // a date in the past means "retry now"
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon"), None);

        let future = (Utc::now() + chrono::Duration::seconds(120)).to_rfc2822();
        let wait = parse_retry_after(&future).unwrap();
        assert!(wait > Duration::from_secs(100) && wait <= Duration::from_secs(120));
    }

    #[test]
    fn test_rate_limit_error_blocks_service() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.should_wait("lichess").is_none());

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "5".parse().unwrap());

        let wait = tracker.update_from_rate_limit_error("lichess", &headers, Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(5));
        assert!(tracker.should_wait("lichess").is_some());
        assert!(tracker.should_wait("wov").is_none());

        tracker.clear("lichess");
        assert!(tracker.should_wait("lichess").is_none());
    }

    #[test]
    fn test_default_retry_after() {
        let tracker = RateLimitTracker::new();
        let wait = tracker.update_from_rate_limit_error("wov", &HeaderMap::new(), Duration::from_secs(60));
        assert_eq!(wait, Duration::from_secs(60));
    }

    #[test]
    fn test_exhausted_window_waits_for_reset() {
        let tracker = RateLimitTracker::new();

        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, "0".parse().unwrap());
        headers.insert(RESET_HEADER, "30".parse().unwrap());
        tracker.update_from_response("wov", &headers);

        let info = tracker.get("wov").unwrap();
        assert_eq!(info.requests_remaining, Some(0));
        assert!(tracker.should_wait("wov").unwrap() <= Duration::from_secs(30));

        let mut refill = HeaderMap::new();
        refill.insert(REMAINING_HEADER, "10".parse().unwrap());
        tracker.update_from_response("wov", &refill);
        assert!(tracker.should_wait("wov").is_none());
    }

    #[test]
    fn test_huge_retry_after_is_capped() {
        let tracker = RateLimitTracker::new();

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "18446744073709551615".parse().unwrap());

        let wait = tracker.update_from_rate_limit_error("lichess", &headers, Duration::from_secs(60));
        assert_eq!(wait, MAX_WAIT);
        assert!(tracker.should_wait("lichess").unwrap() <= MAX_WAIT);
    }

    #[test]
    fn test_huge_reset_is_capped() {
        let tracker = RateLimitTracker::new();

        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, "0".parse().unwrap());
        headers.insert(RESET_HEADER, "18446744073709551615".parse().unwrap());
        tracker.update_from_response("wov", &headers);

        assert!(tracker.should_wait("wov").unwrap() <= MAX_WAIT);
    }

    #[test]
    fn test_is_rate_limit_status() {
        assert!(RateLimitTracker::is_rate_limit_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!RateLimitTracker::is_rate_limit_status(StatusCode::FORBIDDEN));
    }
}
