//! Asynchronous page retrieval.
//!
//! Extractors only ever see [`FetchClient`], a narrow "URL in, body text out"
//! contract. [`HttpFetcher`] is the reqwest-backed implementation used in
//! production; it bounds concurrent outbound requests per host with a
//! configurable ceiling and reports every failure as a [`FetchError`].
//!
//! There is no retry logic here. An extractor that wants retries layers them
//! on top of this primitive.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};
use url::Url;

/// Retrieve the body of `url`, failing after `timeout` if one is given.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] if `url` does not parse
/// - [`FetchError::Status`] for any non-2xx response
/// - [`FetchError::Timeout`] when `timeout` elapses first
/// - [`FetchError::Transport`] for connection or body-read failures
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError>;
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Used when the caller passes no timeout.
    pub default_timeout: Duration,
    /// Ceiling on in-flight requests to a single host.
    pub max_connections_per_host: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("news_conveyor/", env!("CARGO_PKG_VERSION")).to_string(),
            default_timeout: Duration::from_secs(30),
            max_connections_per_host: 4,
        }
    }
}

/// reqwest-backed [`FetchClient`].
pub struct HttpFetcher {
    client: Client,
    settings: FetchSettings,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpFetcher {
    /// Build a fetcher with a reqwest client configured from `settings`.
    ///
    /// # Arguments
    ///
    /// * `settings` - User agent, fallback timeout and per-host ceiling
    ///
    /// # Returns
    ///
    /// The fetcher, or the reqwest error if the TLS backend cannot be set up.
    pub fn new(settings: FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Self::client_builder(&settings).build()?;
        Ok(Self::with_client(client, settings))
    }

    fn client_builder(settings: &FetchSettings) -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(&settings.user_agent)
            .pool_max_idle_per_host(settings.max_connections_per_host)
            .redirect(reqwest::redirect::Policy::limited(5))
    }

    fn with_client(client: Client, settings: FetchSettings) -> Self {
        Self {
            client,
            settings,
            per_host: Mutex::new(HashMap::new()),
        }
    }

    fn host_permits(&self, host: &str) -> Arc<Semaphore> {
        let mut per_host = match self.per_host.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.settings.max_connections_per_host.max(1))))
            .clone()
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

#[async_trait]
impl FetchClient for HttpFetcher {
    #[instrument(level = "debug", skip(self, timeout))]
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        let timeout = timeout.unwrap_or(self.settings.default_timeout);

        let permits = self.host_permits(&host);
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let body = tokio::time::timeout(timeout, self.get_text(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout,
            })??;

        debug!(bytes = body.len(), %host, "Fetched page");
        Ok(body)
    }
}
