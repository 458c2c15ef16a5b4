//! Headless browser page rendering
//!
//! The renderer is the last rung of the fetch escalation ladder. It drives a
//! single headless Chromium instance with a fixed pool of tabs, so at most
//! `pool_size` renders run at once no matter how many workers ask.

use crate::browser::PagePool;
use crate::config::BrowserConfig;
use crate::fetch::FetchError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeLaunchConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info};

/// Renders a URL to its post-JavaScript HTML
///
/// Implementations must be safe to share across workers; concurrency limiting
/// is the implementation's responsibility.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, FetchError>;
}

/// Chromium-backed renderer with a pooled set of tabs
pub struct ChromiumRenderer {
    pool: PagePool<Page>,
    handler_task: JoinHandle<()>,
    _browser: Browser,
    ready_selector: String,
    navigation_timeout: Duration,
    ready_timeout: Duration,
}

impl ChromiumRenderer {
    /// Launches headless Chromium and opens the tab pool
    ///
    /// # Arguments
    ///
    /// * `config` - Browser timeouts and ready selector
    /// * `pool_size` - Number of tabs to open
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumRenderer)` - Browser running with all tabs open
    /// * `Err(String)` - Launch or tab creation failed
    pub async fn launch(config: &BrowserConfig, pool_size: u32) -> Result<Self, String> {
        let launch_config = ChromeLaunchConfig::builder()
            .build()
            .map_err(|e| format!("Browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| format!("Browser launch: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!(error = %e, "Browser handler error");
                    break;
                }
            }
        });

        let mut pages = Vec::with_capacity(pool_size as usize);
        for _ in 0..pool_size {
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| format!("Tab creation: {}", e))?;
            pages.push(page);
        }

        info!(tabs = pool_size, "Headless browser ready");

        Ok(Self {
            pool: PagePool::new(pages),
            handler_task,
            _browser: browser,
            ready_selector: config.page_ready_selector.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
        })
    }

    /// Polls until the ready selector resolves or the deadline passes
    async fn wait_for_ready(&self, page: &Page) -> Result<(), FetchError> {
        let deadline = Instant::now() + self.ready_timeout;

        loop {
            if page.find_element(self.ready_selector.as_str()).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(FetchError::BrowserTimeout);
            }
            sleep(Duration::from_millis(200)).await;
        }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let page = self.pool.acquire().await;
        debug!(url = %url, "Rendering in browser");

        match timeout(self.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(FetchError::Render(e.to_string())),
            Err(_) => return Err(FetchError::BrowserTimeout),
        }

        self.wait_for_ready(&page).await?;

        page.content()
            .await
            .map_err(|e| FetchError::Render(e.to_string()))
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
