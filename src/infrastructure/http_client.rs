//! HTTP client for listing retrieval with rate limiting and cancellation
//!
//! Each source owns one client so the minimum request interval applies per
//! source; waiting on one source's limiter never blocks another source.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::infrastructure::config::ScrapingConfig;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Request cancelled: {url}")]
    Cancelled { url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl FetchError {
    fn from_reqwest(url: &Url, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source: err,
            }
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// HTTP client configuration for one source
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agents: Vec<String>,
    pub timeout: Duration,
    /// Minimum interval between two requests; zero disables limiting
    pub min_interval: Duration,
    pub follow_redirects: bool,
    /// Sent as `Referer`, mimicking a search-engine click-through
    pub referer: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&ScrapingConfig::default())
    }
}

impl From<&ScrapingConfig> for HttpClientConfig {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            user_agents: config.user_agents.clone(),
            timeout: config.request_timeout(),
            min_interval: config.request_delay(),
            follow_redirects: config.follow_redirects,
            referer: Some("https://www.google.com/".to_string()),
        }
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limited client with a rotating `User-Agent`
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: Option<Arc<DirectLimiter>>,
    config: HttpClientConfig,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("dnt", HeaderValue::from_static("1"));
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| FetchError::Client(format!("Invalid referer: {e}")))?;
            headers.insert(REFERER, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let rate_limiter = if config.min_interval.is_zero() {
            None
        } else {
            Quota::with_period(config.min_interval)
                .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN))))
        };

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Pick a `User-Agent` for the next request
    pub fn next_user_agent(&self) -> Option<&str> {
        let agents = &self.config.user_agents;
        if agents.is_empty() {
            return None;
        }
        Some(agents[fastrand::usize(..agents.len())].as_str())
    }

    /// Fetch `url` as text, observing `cancel` at every suspension point
    pub async fn get_text(&self, url: &Url, cancel: &CancellationToken) -> Result<String, FetchError> {
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        if let Some(limiter) = &self.rate_limiter {
            tokio::select! {
                () = limiter.until_ready() => {},
                () = cancel.cancelled() => return Err(cancelled()),
            }
        }

        let mut request = self.client.get(url.clone());
        if let Some(agent) = self.next_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        debug!("Fetching {}", url);
        let response = tokio::select! {
            result = request.send() => result.map_err(|e| FetchError::from_reqwest(url, e))?,
            () = cancel.cancelled() => {
                warn!("HTTP request cancelled for URL: {}", url);
                return Err(cancelled());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let text = tokio::select! {
            result = response.text() => result.map_err(|e| FetchError::from_reqwest(url, e))?,
            () = cancel.cancelled() => return Err(cancelled()),
        };

        debug!("Fetched {} ({} bytes)", url, text.len());
        Ok(text)
    }

    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
