use crate::fetch::ProxyDescriptor;
use serde::Deserialize;

/// Main configuration structure for Bookwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub proxy: Vec<ProxyDescriptor>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent in-flight fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum fetch attempts per work item per run
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base unit for the linear backoff delay (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_concurrency() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the catalogue site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Catalogue page URL template; `{page}` is replaced by the page number
    #[serde(rename = "catalogue-url-template")]
    pub catalogue_url_template: String,

    /// Page title that signals an anti-bot interstitial instead of content.
    /// Empty disables block detection.
    #[serde(rename = "block-page-title", default)]
    pub block_page_title: String,
}

impl SiteConfig {
    /// Builds the URL of the given catalogue page number
    pub fn catalogue_url(&self, page: u32) -> String {
        self.catalogue_url_template
            .replace("{page}", &page.to_string())
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub name: String,

    /// Version of the crawler
    pub version: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory for raw HTML snapshots, keyed by content hash
    #[serde(rename = "snapshot-dir", default)]
    pub snapshot_dir: Option<String>,
}

/// Storage behavior configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Enforce uniqueness of record content hashes across source URLs.
    /// When on, two distinct URLs serving byte-identical documents cannot
    /// both persist, so it is off unless explicitly requested.
    #[serde(rename = "unique-content-hash", default)]
    pub unique_content_hash: bool,
}

/// Headless browser fallback configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Whether the browser fallback is available for this run
    #[serde(default)]
    pub enabled: bool,

    /// Number of pooled page handles; defaults to the crawler concurrency
    #[serde(rename = "pool-size", default)]
    pub pool_size: Option<u32>,

    /// Selector that must appear before a rendered page is considered ready
    #[serde(rename = "page-ready-selector", default = "default_ready_selector")]
    pub page_ready_selector: String,

    /// Navigation timeout (seconds)
    #[serde(rename = "navigation-timeout-secs", default = "default_nav_timeout")]
    pub navigation_timeout_secs: u64,

    /// Ready-selector wait timeout (seconds)
    #[serde(rename = "ready-timeout-secs", default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_ready_selector() -> String {
    "body".to_string()
}

fn default_nav_timeout() -> u64 {
    15
}

fn default_ready_timeout() -> u64 {
    10
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pool_size: None,
            page_ready_selector: default_ready_selector(),
            navigation_timeout_secs: default_nav_timeout(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}
