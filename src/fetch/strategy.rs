//! Anti-blocking fetch strategy
//!
//! Requests go through the current proxy while one is held. A proxy that
//! returns the block page is burned: it is popped off the rotation and never
//! reused. Once no proxy remains (or none was ever configured), the headless
//! browser takes over; without a browser either, requests go out directly.
//!
//! Only block pages rotate the proxy. Network and HTTP failures surface to
//! the retry loop unchanged, because switching exit nodes does not fix a dead
//! server. The decision is made per request, so different URLs in one run may
//! resolve through different strategies.

use crate::browser::PageRenderer;
use crate::config::Config;
use crate::fetch::{http_get, FetchError};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One proxy endpoint from the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyDescriptor {
    pub url: String,
}

/// The pool of not-yet-burned proxies
///
/// Clients are built once at startup; the rotation hands out the top of the
/// stack until it is discarded or the stack runs dry.
pub struct ProxyRotation {
    proxies: Vec<(ProxyDescriptor, reqwest::Client)>,
}

impl ProxyRotation {
    /// Builds a client per configured proxy
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut proxies = Vec::with_capacity(config.proxy.len());
        for descriptor in &config.proxy {
            let client = reqwest::Client::builder()
                .user_agent(config.user_agent.header_value())
                .timeout(std::time::Duration::from_secs(
                    config.crawler.request_timeout_secs,
                ))
                .proxy(reqwest::Proxy::all(&descriptor.url)?)
                .build()?;
            proxies.push((descriptor.clone(), client));
        }
        Ok(Self { proxies })
    }

    /// The proxy currently on top of the stack, if any
    pub fn current(&self) -> Option<&(ProxyDescriptor, reqwest::Client)> {
        self.proxies.last()
    }

    /// Discards the top proxy
    pub fn discard(&mut self) -> Option<ProxyDescriptor> {
        self.proxies.pop().map(|(descriptor, _)| descriptor)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

/// Escalating fetch strategy shared by all workers
pub struct FetchStrategy {
    plain: reqwest::Client,
    rotation: Mutex<ProxyRotation>,
    renderer: Option<Arc<dyn PageRenderer>>,
    block_page_title: String,
}

impl FetchStrategy {
    pub fn new(
        config: &Config,
        plain: reqwest::Client,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            plain,
            rotation: Mutex::new(ProxyRotation::new(config)?),
            renderer,
            block_page_title: config.site.block_page_title.clone(),
        })
    }

    /// Performs a single fetch, escalating past block pages
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page HTML
    /// * `Err(FetchError)` - The fetch failed at every available stage
    pub async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        if let Some(body) = self.fetch_via_proxies(url).await? {
            return Ok(body);
        }

        if let Some(renderer) = &self.renderer {
            debug!(url = %url, "No usable proxy, rendering in browser");
            // The browser is the last rung; whatever it renders is the answer.
            return renderer.render(url).await;
        }

        let body = http_get(&self.plain, url).await?;
        if self.is_block_page(&body) {
            return Err(FetchError::BlockDetected);
        }
        Ok(body)
    }

    /// Works through the proxy rotation, burning proxies that serve the
    /// block page. `Ok(None)` means no proxy was available, either because
    /// none was configured or all were burned.
    ///
    /// The rotation lock is held only to read or pop the stack, never across
    /// a request, so concurrent workers fetch through the same proxy in
    /// parallel.
    async fn fetch_via_proxies(&self, url: &str) -> Result<Option<String>, FetchError> {
        loop {
            let (proxy_url, client) = {
                let rotation = self.rotation.lock().await;
                match rotation.current() {
                    Some((descriptor, client)) => (descriptor.url.clone(), client.clone()),
                    None => return Ok(None),
                }
            };

            let outcome = http_get(&client, url).await;

            match outcome {
                Ok(body) if !self.is_block_page(&body) => {
                    debug!(url = %url, proxy = %proxy_url, "Fetched via proxy");
                    return Ok(Some(body));
                }
                Ok(_) => {
                    warn!(proxy = %proxy_url, "Proxy served a block page, discarding");
                    let mut rotation = self.rotation.lock().await;
                    // Another worker may have burned this proxy already
                    if rotation
                        .current()
                        .map(|(descriptor, _)| descriptor.url == proxy_url)
                        .unwrap_or(false)
                    {
                        rotation.discard();
                    }
                }
                // A transport failure keeps the proxy; the retry loop owns
                // that failure mode.
                Err(e) => return Err(e),
            }
        }
    }

    /// Checks whether the HTML is the site's anti-bot interstitial
    ///
    /// Detection compares the document title against the configured block
    /// title. An empty configured title disables detection entirely.
    pub fn is_block_page(&self, html: &str) -> bool {
        if self.block_page_title.is_empty() {
            return false;
        }

        let document = Html::parse_document(html);
        let selector = Selector::parse("title").unwrap();

        document
            .select(&selector)
            .next()
            .map(|title| title.text().collect::<String>().trim() == self.block_page_title)
            .unwrap_or(false)
    }
}
