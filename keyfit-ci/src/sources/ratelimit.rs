//! Politeness and retry plumbing shared by the HTTP catalog adapters
//!
//! **[CIN-SRC-020]** One request at a time per external source with an
//! explicit delay between requests, and a bounded retry with exponential
//! backoff on transient failures. Catalog sites are small businesses; being
//! a polite crawler is part of the contract.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CiConfig;
use crate::error::CiError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "KeyFit/0.1.0 (catalog sync; https://keyfit.app)";

/// Enforces a minimum interval between requests to one external source.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the politeness delay.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Rate-limited, retrying JSON fetcher shared by the catalog adapters.
pub struct CatalogClient {
    http: reqwest::Client,
    limiter: RateLimiter,
    max_attempts: u32,
    retry_base_delay: Duration,
}

impl CatalogClient {
    pub fn new(config: &CiConfig) -> Result<Self, CiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| CiError::Adapter(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            limiter: RateLimiter::new(config.request_delay_ms),
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// GET a JSON document, retrying transient failures (timeouts,
    /// connection errors, 429, 5xx) with a doubling backoff. Permanent
    /// failures and exhausted retries surface as `CiError::Adapter`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CiError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = self.retry_base_delay * 2u32.pow(attempt - 1);
                warn!(
                    url,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying catalog request after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            self.limiter.wait().await;

            let response = match self.http.get(url).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(CiError::Adapter(format!("Request to {url} failed: {e}")));
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = format!("HTTP {status}");
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CiError::Adapter(format!(
                    "Request to {url} failed with HTTP {status}: {body}"
                )));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| CiError::Adapter(format!("Failed to decode {url}: {e}")));
        }

        Err(CiError::Adapter(format!(
            "Request to {url} failed after {} attempts: {last_error}",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_spaces_out_requests() {
        let limiter = RateLimiter::new(50);
        let started = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(
            started.elapsed() >= Duration::from_millis(100),
            "three requests at 50ms spacing should take at least 100ms"
        );
    }

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let limiter = RateLimiter::new(1000);
        let started = Instant::now();
        limiter.wait().await;
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
