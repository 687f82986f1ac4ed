//! Wolvesville API
//!
//! Thin wrappers over the Wolvesville bot API. Every call returns the parsed
//! JSON payload; failures are reported and returned as errors.

use crate::client::{auth_headers, join_url, HttpClient};
use crate::config::WovSettings;
use crate::error::{ApiError, Result};
use crate::report::{ApiFailure, Reporter};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "wov";

/// Client for the Wolvesville API
pub struct WovClient {
    http: Arc<HttpClient>,
    base_url: String,
    headers: HeaderMap,
    default_retry_after: Duration,
    reporter: Arc<dyn Reporter>,
}

impl WovClient {
    /// Build a client from settings; the token must be set in the environment
    pub fn new(
        settings: &WovSettings,
        http: Arc<HttpClient>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let token = settings.token().ok_or_else(|| {
            ApiError::Config(format!("Wolvesville token not set. Export {}", settings.token_env))
        })?;
        Ok(Self::with_token(&settings.base_url, &token, http, reporter)?
            .with_default_retry_after(settings.default_retry_after()))
    }

    /// Build a client for `base_url` with an explicit bot token
    pub fn with_token(
        base_url: &str,
        token: &str,
        http: Arc<HttpClient>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            headers: auth_headers("Bot", token)?,
            default_retry_after: Duration::from_secs(60),
            reporter,
        })
    }

    /// How long to hold off after a 429 that carries no `Retry-After`
    pub fn with_default_retry_after(mut self, wait: Duration) -> Self {
        self.default_retry_after = wait;
        self
    }

    /// Player profile by ID
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Value> {
        let path = format!("players/{}", user_id);
        self.fetch("User", &path, &[], Some(("User ID", user_id))).await
    }

    /// Player search by exact username
    pub async fn get_user_by_name(&self, username: &str) -> Result<Value> {
        self.fetch(
            "User",
            "players/search",
            &[("username", username)],
            Some(("Username", username)),
        )
        .await
    }

    /// Clan info by ID
    pub async fn get_clan_by_id(&self, clan_id: &str) -> Result<Value> {
        let path = format!("clans/{}/info", clan_id);
        self.fetch("Clan", &path, &[], Some(("Clan ID", clan_id))).await
    }

    /// Clan search by name
    pub async fn get_clan_by_name(&self, clan_name: &str) -> Result<Value> {
        self.fetch(
            "Clan",
            "clans/search",
            &[("name", clan_name)],
            Some(("Clan name", clan_name)),
        )
        .await
    }

    /// Members of a clan
    pub async fn get_clan_members(&self, clan_id: &str) -> Result<Value> {
        let path = format!("clans/{}/members", clan_id);
        self.fetch("Clan Members", &path, &[], Some(("Clan ID", clan_id)))
            .await
    }

    /// Currently active shop offers
    pub async fn get_shop(&self) -> Result<Value> {
        self.fetch("Shop", "shop/activeOffers", &[], None).await
    }

    async fn fetch(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&str, &str)],
        subject: Option<(&str, &str)>,
    ) -> Result<Value> {
        let url = join_url(&self.base_url, path);
        let result = self
            .http
            .get_json(SERVICE, &url, &self.headers, query, self.default_retry_after)
            .await;

        if let Err(error) = &result {
            self.reporter.report(&ApiFailure {
                service: "Wov",
                endpoint,
                subject,
                error,
            });
        }

        result
    }
}
