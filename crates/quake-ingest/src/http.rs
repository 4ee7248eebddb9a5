//! HTTP client construction and bounded retry

use crate::config::IngestConfig;
use crate::error::{FetchError, Retryable};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Build the shared client used for feeds and publishing
pub fn build_client(config: &IngestConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .build()
}

/// Attempt budget and backoff for one network operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff())
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Backoff after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && err.is_retryable() => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

/// GET `url` and return the body, retrying transport errors and 5xx
pub async fn fetch_bytes(
    client: &Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    retry(policy, url, || fetch_once(client, url)).await
}

async fn fetch_once(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |source: reqwest::Error| FetchError::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(transport)?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let bytes = response.bytes().await.map_err(transport)?;
    debug!(url = %url, bytes = bytes.len(), "Fetched");

    Ok(bytes.to_vec())
}
