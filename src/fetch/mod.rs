//! HTTP fetching with retry, backoff, and anti-blocking escalation
//!
//! Every fetch goes through the same ladder: the proxy rotation while a
//! proxy is held, the headless browser once no proxy remains, and plain
//! direct HTTP when neither is configured. The [`Fetcher`] wraps that ladder
//! in a bounded retry loop with linearly increasing delays.

mod backoff;
mod fetcher;
mod strategy;

pub use backoff::BackoffPolicy;
pub use fetcher::Fetcher;
pub use strategy::{FetchStrategy, ProxyDescriptor, ProxyRotation};

use crate::config::Config;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching a page
///
/// Every variant shares the same per-run attempt budget; a URL whose
/// attempts are spent simply stays queued for the next run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Block page detected and no fallback succeeded")]
    BlockDetected,

    #[error("Browser did not produce a ready page in time")]
    BrowserTimeout,

    #[error("Browser render failed: {0}")]
    Render(String),
}

/// Builds the shared HTTP client used for direct fetches
///
/// # Arguments
///
/// * `config` - The loaded configuration (user agent, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Configured HTTP client
/// * `Err(reqwest::Error)` - Client construction failed
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one GET and classifies the outcome
pub(crate) async fn http_get(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))
}

