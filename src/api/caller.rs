//! Queued Wolvesville Calls
//!
//! Routes Wolvesville requests through a [`RateLimitedQueue`] so that no
//! two calls run at once and consecutive calls respect the cooldown.

use crate::api::wov::WovClient;
use crate::error::ApiError;
use crate::queue::{PendingResult, QueueConfig, QueueError, QueueStats, RateLimitedQueue};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// A queued Wolvesville call
pub type PendingCall = PendingResult<Value, ApiError>;

/// Wolvesville client bound to a rate-limited queue
#[derive(Clone)]
pub struct WovApiCaller {
    client: Arc<WovClient>,
    queue: RateLimitedQueue,
}

impl WovApiCaller {
    /// Start a dedicated queue for this client
    pub fn new(client: WovClient, config: QueueConfig) -> Self {
        Self::with_queue(client, RateLimitedQueue::start(config))
    }

    /// Share an existing queue, e.g. one rate limit across several callers
    pub fn with_queue(client: WovClient, queue: RateLimitedQueue) -> Self {
        Self {
            client: Arc::new(client),
            queue,
        }
    }

    /// The underlying queue, e.g. for stats
    pub fn queue(&self) -> &RateLimitedQueue {
        &self.queue
    }

    /// Unqueued access to the client
    pub fn client(&self) -> &Arc<WovClient> {
        &self.client
    }

    /// Queue any call against the client
    pub fn add_to_queue<F, Fut, T>(&self, call: F) -> PendingResult<T, ApiError>
    where
        F: FnOnce(Arc<WovClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        self.queue.submit(call, Arc::clone(&self.client))
    }

    /// Queued [`WovClient::get_user_by_id`]
    pub fn get_user_by_id(&self, user_id: &str) -> PendingCall {
        let user_id = user_id.to_string();
        self.add_to_queue(move |client| async move { client.get_user_by_id(&user_id).await })
    }

    /// Queued [`WovClient::get_user_by_name`]
    pub fn get_user_by_name(&self, username: &str) -> PendingCall {
        let username = username.to_string();
        self.add_to_queue(move |client| async move { client.get_user_by_name(&username).await })
    }

    /// Queued [`WovClient::get_clan_by_id`]
    pub fn get_clan_by_id(&self, clan_id: &str) -> PendingCall {
        let clan_id = clan_id.to_string();
        self.add_to_queue(move |client| async move { client.get_clan_by_id(&clan_id).await })
    }

    /// Queued [`WovClient::get_clan_by_name`]
    pub fn get_clan_by_name(&self, clan_name: &str) -> PendingCall {
        let clan_name = clan_name.to_string();
        self.add_to_queue(move |client| async move { client.get_clan_by_name(&clan_name).await })
    }

    /// Queued [`WovClient::get_clan_members`]
    pub fn get_clan_members(&self, clan_id: &str) -> PendingCall {
        let clan_id = clan_id.to_string();
        self.add_to_queue(move |client| async move { client.get_clan_members(&clan_id).await })
    }

    /// Queued [`WovClient::get_shop`]
    pub fn get_shop(&self) -> PendingCall {
        self.add_to_queue(|client| async move { client.get_shop().await })
    }

    /// Finish queued calls and stop the queue
    pub async fn shutdown(&self) -> Result<QueueStats, QueueError> {
        self.queue.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpClient;
    use crate::config::HttpSettings;
    use crate::queue::TaskError;
    use crate::report::testing::RecordingReporter;
    use std::time::{Duration, Instant};

    fn caller(server: &mockito::Server, cooldown: Duration) -> (WovApiCaller, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let http = Arc::new(HttpClient::new(&HttpSettings::default()).unwrap());
        let client = WovClient::with_token(&server.url(), "secret", http, reporter.clone()).unwrap();
        (WovApiCaller::new(client, QueueConfig::new("wov", cooldown)), reporter)
    }

    #[tokio::test]
    async fn test_queued_calls_resolve_in_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/players/1")
            .with_status(200)
            .with_body(r#"{"id":"1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/players/2")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/clans/3/info")
            .with_status(200)
            .with_body(r#"{"id":"3"}"#)
            .create_async()
            .await;

        let cooldown = Duration::from_millis(20);
        let (caller, reporter) = caller(&server, cooldown);
        let started = Instant::now();

        let first = caller.get_user_by_id("1");
        let second = caller.get_user_by_id("2");
        let third = caller.get_clan_by_id("3");

        assert_eq!(first.await.unwrap()["id"], "1");
        match second.await {
            Err(TaskError::Failed(err)) => assert_eq!(err.status_code(), Some(500)),
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
        assert_eq!(third.await.unwrap()["id"], "3");
        assert!(started.elapsed() >= cooldown * 2);

        assert_eq!(reporter.lines.lock().len(), 1);
        let stats = caller.shutdown().await.unwrap();
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_custom_call_and_error_conversion() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/shop/activeOffers")
            .with_status(200)
            .with_body("[1, 2, 3]")
            .create_async()
            .await;

        let (caller, _) = caller(&server, Duration::from_millis(1));
        let count = caller
            .add_to_queue(|client| async move {
                let offers = client.get_shop().await?;
                Ok(offers.as_array().map(Vec::len).unwrap_or(0))
            })
            .await
            .map_err(ApiError::from)
            .unwrap();
        assert_eq!(count, 3);

        caller.shutdown().await.unwrap();
        let late = caller.get_shop().await.map_err(ApiError::from);
        assert!(matches!(late, Err(ApiError::QueueStopped)));
    }
}
