//! Search-results page retrieval.

mod origin;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

pub use origin::{extract_domain, resolve_link};

pub(crate) const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Rendered content of one search-results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL the page was loaded from; relative listing links resolve against it.
    pub url: String,
    pub html: String,
}

impl Page {
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Loads a search-results page for the extraction side of a match.
pub trait PageFetcher: Send + Sync {
    /// Fetches the page at `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Page, ScraperError>> + Send;
}

/// [`PageFetcher`] backed by a plain HTTP GET.
///
/// Transient errors (429, 5xx, network failures) are retried with exponential
/// backoff. A 403 or 503 with the configured User-Agent is retried once with a
/// browser User-Agent, since storefronts often gate bot-looking clients.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpPageFetcher {
    /// Creates a fetcher with configured timeout, `User-Agent`, and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Builds a fetcher from the application config.
    ///
    /// # Errors
    ///
    /// Same as [`HttpPageFetcher::new`].
    pub fn from_app_config(config: &xmatch_core::AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_secs,
        )
    }

    async fn fetch_with_user_agent(
        &self,
        url: &str,
        user_agent_override: Option<&str>,
    ) -> Result<Page, ScraperError> {
        if reqwest::Url::parse(url).is_err() {
            return Err(ScraperError::InvalidUrl {
                url: url.to_owned(),
                reason: "not an absolute URL".to_owned(),
            });
        }

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let mut request = self
                .client
                .get(url)
                .header(
                    reqwest::header::ACCEPT,
                    "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                )
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(reqwest::header::CACHE_CONTROL, "no-cache");

            if let Some(ua) = user_agent_override {
                request = request.header(reqwest::header::USER_AGENT, ua);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(ScraperError::RateLimited {
                    domain: extract_domain(url),
                    retry_after_secs,
                });
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScraperError::NotFound {
                    url: url.to_owned(),
                });
            }

            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            let final_url = response.url().to_string();
            let html = response.text().await?;
            Ok(Page::new(final_url, html))
        })
        .await
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Page, ScraperError>> + Send {
        async move {
            match self.fetch_with_user_agent(url, None).await {
                Err(ScraperError::UnexpectedStatus { status, .. })
                    if status == 403 || status == 503 =>
                {
                    tracing::debug!(url, status, "search page blocked, retrying with browser UA");
                    self.fetch_with_user_agent(url, Some(BROWSER_FALLBACK_UA))
                        .await
                }
                other => other,
            }
        }
    }
}

/// [`PageFetcher`] that serves a fixed page regardless of the requested URL.
///
/// Useful for replaying a saved search page through the full matching flow.
#[derive(Debug, Clone)]
pub struct StaticPageFetcher {
    html: String,
}

impl StaticPageFetcher {
    #[must_use]
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

impl PageFetcher for StaticPageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Page, ScraperError>> + Send {
        let page = Page::new(url, self.html.clone());
        async move { Ok(page) }
    }
}
