//! HTTP retrieval of listing and article pages.
//!
//! A single [`reqwest::Client`] is built up front with the request timeout
//! and user agent. Every failure (connect error, timeout, non-2xx status)
//! comes back as a [`FetchError`]. Callers treat that as "nothing new this
//! tick" and leave their state alone. There are no retries inside a tick;
//! the next tick is the retry.

use crate::config::Config;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

/// A fetched document.
///
/// Only the body text is kept. It is parsed at extraction time, since the
/// parsed DOM cannot be held across an `.await`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub body: String,
}

/// Anything that can fetch a page by URL.
pub trait FetchPage {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(config.fetch_timeout(), &config.user_agent)
    }
}

impl FetchPage for Fetcher {
    #[instrument(level = "info", skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await.inspect_err(|e| {
            warn!(error = %e, "Request failed");
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(Page {
            url: url.to_string(),
            body,
        })
    }
}
