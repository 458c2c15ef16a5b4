//! Bookwatch: a resumable book-catalogue crawl engine
//!
//! This crate implements a fault-tolerant crawler for a book catalogue site.
//! It maintains a persisted work queue of catalogue and detail pages, fetches
//! them with bounded concurrency and retry/backoff, escalates to a headless
//! browser when an anti-bot interstitial is detected, and versions extracted
//! records by content hash so that changes between runs are logged.

pub mod browser;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod queue;
pub mod storage;
pub mod tracker;

use thiserror::Error;

/// Main error type for Bookwatch operations
#[derive(Debug, Error)]
pub enum BookwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Extraction error: {0}")]
    Parse(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Bookwatch operations
pub type Result<T> = std::result::Result<T, BookwatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::Engine;
pub use queue::{ItemStatus, PageKind, WorkItem};
pub use storage::{BookRecord, ChangeLogEntry, UpsertOutcome};
