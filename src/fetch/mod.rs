//! Upstream page fetching.
//!
//! Pages are retrieved from royaleapi.com as raw HTML. There is no caching
//! and no retry: every call goes to the network once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION,
    USER_AGENT,
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::models::PlayerTag;

/// Default upstream site.
pub const DEFAULT_BASE_URL: &str = "https://royaleapi.com";

/// Browser user agents rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Player with tag {0} not found")]
    NotFound(PlayerTag),

    #[error("Rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Source of raw player pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// The player's profile page. A missing player is [`FetchError::NotFound`].
    async fn profile_page(&self, tag: &PlayerTag) -> Result<String, FetchError>;

    /// The card levels page, or `None` when it cannot be retrieved.
    async fn card_levels_page(&self, tag: &PlayerTag) -> Result<Option<String>, FetchError>;

    /// The battle log page.
    async fn battles_page(&self, tag: &PlayerTag) -> Result<String, FetchError>;
}

/// HTTP client for royaleapi.com player pages.
pub struct RoyaleApiClient {
    client: Client,
    base_url: Url,
    user_agent: Option<String>,
    next_agent: AtomicUsize,
}

impl RoyaleApiClient {
    /// Create a client. Without a fixed `user_agent`, agents are rotated.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        user_agent: Option<String>,
    ) -> Result<Self, FetchError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        // Page paths are joined relative to the base; keep its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(browser_headers())
            .build()?;

        Ok(Self {
            client,
            base_url,
            user_agent,
            next_agent: AtomicUsize::new(0),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_seconds),
            config.user_agent.clone(),
        )
    }

    /// URL of a player page, e.g. `/player/L2QV2J2RC/battles`.
    fn page_url(&self, tag: &PlayerTag, suffix: &str) -> Result<Url, FetchError> {
        let path = format!("player/{}{}", tag.bare(), suffix);
        self.base_url
            .join(&path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn user_agent(&self) -> &str {
        match &self.user_agent {
            Some(agent) => agent.as_str(),
            None => {
                let index = self.next_agent.fetch_add(1, Ordering::Relaxed);
                USER_AGENTS[index % USER_AGENTS.len()]
            }
        }
    }

    async fn get(&self, tag: &PlayerTag, url: Url) -> Result<String, FetchError> {
        info!("Fetching {}", url);

        let response = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, self.user_agent())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(tag.clone()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        debug!(url = %url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

#[async_trait]
impl PageSource for RoyaleApiClient {
    async fn profile_page(&self, tag: &PlayerTag) -> Result<String, FetchError> {
        let url = self.page_url(tag, "")?;
        self.get(tag, url).await
    }

    async fn card_levels_page(&self, tag: &PlayerTag) -> Result<Option<String>, FetchError> {
        let result = match self.page_url(tag, "/cards/levels") {
            Ok(url) => self.get(tag, url).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(body) => Ok(Some(body)),
            Err(e) => {
                warn!(tag = %tag, error = %e, "Card levels page unavailable");
                Ok(None)
            }
        }
    }

    async fn battles_page(&self, tag: &PlayerTag) -> Result<String, FetchError> {
        let url = self.page_url(tag, "/battles")?;
        self.get(tag, url).await
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers
}

/// Canned pages for testing. A missing profile reads as not found.
#[cfg(test)]
#[derive(Default)]
pub struct MockSource {
    pub profile: Option<String>,
    pub card_levels: Option<String>,
    pub battles: Option<String>,
    pub unreachable: bool,
}

#[cfg(test)]
impl MockSource {
    fn check(&self) -> Result<(), FetchError> {
        if self.unreachable {
            return Err(FetchError::HttpStatus {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl PageSource for MockSource {
    async fn profile_page(&self, tag: &PlayerTag) -> Result<String, FetchError> {
        self.check()?;
        self.profile
            .clone()
            .ok_or_else(|| FetchError::NotFound(tag.clone()))
    }

    async fn card_levels_page(&self, _tag: &PlayerTag) -> Result<Option<String>, FetchError> {
        Ok(self.card_levels.clone())
    }

    async fn battles_page(&self, tag: &PlayerTag) -> Result<String, FetchError> {
        self.check()?;
        self.battles
            .clone()
            .ok_or_else(|| FetchError::NotFound(tag.clone()))
    }
}
