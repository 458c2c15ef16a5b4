//! Retrying fetch wrapper

use crate::fetch::{BackoffPolicy, FetchError, FetchStrategy};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches pages through the escalation strategy with bounded retries
pub struct Fetcher {
    strategy: Arc<FetchStrategy>,
    policy: BackoffPolicy,
}

impl Fetcher {
    pub fn new(strategy: Arc<FetchStrategy>, policy: BackoffPolicy) -> Self {
        Self { strategy, policy }
    }

    /// Fetches a URL, retrying failures with linear backoff
    ///
    /// Transport errors, HTTP status errors, and browser failures all draw
    /// from the same attempt budget.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page HTML
    /// * `Err(FetchError)` - The last error after all attempts were spent
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            match self.strategy.fetch_once(url).await {
                Ok(body) => {
                    debug!(url = %url, attempt = attempt, "Fetch succeeded");
                    return Ok(body);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        url = %url,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url = %url, attempt = attempt, error = %e, "Fetch failed, giving up");
                    return Err(e);
                }
            }
        }

        // max_attempts is validated to be at least 1, so the loop always
        // returns before falling through.
        unreachable!("retry loop exits on the final attempt")
    }
}
