use crate::config::types::{BrowserConfig, Config, CrawlerConfig, SiteConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_browser_config(&config.browser)?;
    validate_proxies(config)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !config.catalogue_url_template.contains("{page}") {
        return Err(ConfigError::Validation(
            "catalogue_url_template must contain a {page} placeholder".to_string(),
        ));
    }

    // The template must produce a parseable URL
    Url::parse(&config.catalogue_url(1))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid catalogue_url_template: {}", e)))?;

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if let Some(dir) = &config.snapshot_dir {
        if dir.is_empty() {
            return Err(ConfigError::Validation(
                "snapshot_dir cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates browser fallback configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if let Some(size) = config.pool_size {
        if size < 1 {
            return Err(ConfigError::Validation(format!(
                "browser pool_size must be >= 1, got {}",
                size
            )));
        }
    }

    if config.enabled && config.page_ready_selector.is_empty() {
        return Err(ConfigError::Validation(
            "page_ready_selector cannot be empty when the browser is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates proxy descriptors
fn validate_proxies(config: &Config) -> Result<(), ConfigError> {
    for proxy in &config.proxy {
        Url::parse(&proxy.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy url: {}", e)))?;
    }
    Ok(())
}
