//! Lichess API
//!
//! User performance lookups and the regulated game export.

use crate::api::export::{ExportOptions, PerfType};
use crate::api::ndjson::{parse_ndjson, NdjsonDecoder};
use crate::client::{auth_header, join_url, HttpClient, RetryPolicy};
use crate::config::LichessSettings;
use crate::error::{ApiError, Result};
use crate::report::{ApiFailure, Reporter};
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

const SERVICE: &str = "lichess";

/// Stream of exported games
pub type GameStream<'a> = Pin<Box<dyn Stream<Item = Result<Value>> + Send + 'a>>;

/// Client for the Lichess API
pub struct LichessClient {
    http: Arc<HttpClient>,
    base_url: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    reporter: Arc<dyn Reporter>,
}

impl LichessClient {
    /// Build a client from settings; the token is optional for public data
    pub fn new(
        settings: &LichessSettings,
        http: Arc<HttpClient>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        Self::with_token(
            &settings.base_url,
            settings.token().as_deref(),
            settings.retry_policy(),
            http,
            reporter,
        )
    }

    /// Build a client with an optional token and an explicit retry policy
    pub fn with_token(
        base_url: &str,
        token: Option<&str>,
        retry: RetryPolicy,
        http: Arc<HttpClient>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, auth_header("Bearer", token)?);
        }

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            headers,
            retry,
            reporter,
        })
    }

    /// Performance statistics of a user in one speed or variant
    pub async fn user_performance(&self, username: &str, perf: PerfType) -> Result<Value> {
        let url = join_url(&self.base_url, &format!("user/{}/perf/{}", username, perf));
        let result = self
            .http
            .get_json(
                SERVICE,
                &url,
                &self.headers,
                &[] as &[(&str, &str)],
                self.retry.default_retry_after,
            )
            .await;

        if let Err(error) = &result {
            self.report("User Performance", username, error);
        }
        result
    }

    /// Export a user's games as parsed JSON values
    ///
    /// The request is retried on 429 and transport errors. Any failure is
    /// reported with the username.
    pub async fn export_by_player(
        &self,
        username: &str,
        options: &ExportOptions,
    ) -> Result<Vec<Value>> {
        let result = self.fetch_export(username, options).await;

        if let Err(error) = &result {
            self.report("Export By Player", username, error);
        }
        result
    }

    async fn fetch_export(&self, username: &str, options: &ExportOptions) -> Result<Vec<Value>> {
        let url = self.export_url(username);
        let query = options.to_query();
        let resp = self
            .http
            .get_regulated(SERVICE, &url, &self.export_headers(), &query, &self.retry)
            .await?;

        let body = resp.text().await?;
        let games = parse_ndjson(&body)?;
        debug!(username, games = games.len(), "fetch_export: done");
        Ok(games)
    }

    /// Export a user's games, yielding each one as soon as its line arrives
    ///
    /// The first failure is reported and yielded as the last item.
    pub fn export_by_player_stream<'a>(
        &'a self,
        username: &'a str,
        options: &'a ExportOptions,
    ) -> GameStream<'a> {
        use async_stream::stream;
        use futures::StreamExt;

        let s = stream! {
            let url = self.export_url(username);
            let query = options.to_query();
            let headers = self.export_headers();

            let mut bytes = match self.http.get_stream(SERVICE, &url, &headers, &query, &self.retry).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.report("Export By Player", username, &e);
                    yield Err(e);
                    return;
                }
            };

            let mut decoder = NdjsonDecoder::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(e) => {
                        self.report("Export By Player", username, &e);
                        yield Err(e);
                        return;
                    }
                }

                loop {
                    match decoder.next_value() {
                        Ok(Some(game)) => yield Ok(game),
                        Ok(None) => break,
                        Err(e) => {
                            self.report("Export By Player", username, &e);
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            match decoder.finish() {
                Ok(Some(game)) => yield Ok(game),
                Ok(None) => {}
                Err(e) => {
                    self.report("Export By Player", username, &e);
                    yield Err(e);
                }
            }
        };

        Box::pin(s)
    }

    fn export_url(&self, username: &str) -> String {
        join_url(&self.base_url, &format!("games/user/{}", username))
    }

    fn export_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static("application/x-ndjson"));
        headers
    }

    fn report(&self, endpoint: &str, username: &str, error: &ApiError) {
        self.reporter.report(&ApiFailure {
            service: "Lichess",
            endpoint,
            subject: Some(("Username", username)),
            error,
        });
    }
}
