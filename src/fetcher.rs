//! HTTP fetcher for the upstream schedule page
//!
//! Retrieves the raw publication markup with a bounded timeout and a small
//! number of retries with exponential backoff. A failure after retries
//! surfaces as [`Error::SourceUnavailable`]; it never touches stored
//! schedules, so readers keep serving the last applied snapshot.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client, StatusCode,
};
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::{Error, Result};

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 30_000;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Fetcher for the utility's schedule page
pub struct SourceFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Page URL to fetch
    url: String,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,
}

impl SourceFetcher {
    /// Create a fetcher from the source configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Self::with_settings(
            &config.url,
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
            1000,
        )
    }

    /// Create a fetcher with explicit settings (used by tests with a mock
    /// server and a short backoff)
    pub fn with_settings(
        url: &str,
        timeout: Duration,
        max_retries: u32,
        base_delay_ms: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            max_retries,
            base_delay_ms,
        })
    }

    /// Fetch the schedule page, retrying transient failures
    pub async fn fetch_page(&self) -> Result<String> {
        let mut last_failure = String::from("no attempts made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                debug!(attempt, delay_ms = delay, "retrying fetch after delay");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self
                .client
                .get(&self.url)
                .headers(self.build_headers())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.text().await?;
                        debug!(bytes = body.len(), "fetched schedule page");
                        return Ok(body);
                    }

                    last_failure = format!("HTTP {}", status.as_u16());
                    if !Self::should_retry(status) {
                        // Client errors will not heal on retry.
                        return Err(Error::SourceUnavailable(last_failure));
                    }
                    warn!(status = status.as_u16(), attempt, "retryable server response");
                }
                Err(e) => {
                    last_failure = if e.is_timeout() {
                        String::from("request timeout")
                    } else {
                        e.to_string()
                    };
                    warn!(error = %last_failure, attempt, "fetch attempt failed");
                }
            }
        }

        Err(Error::SourceUnavailable(format!(
            "retries exhausted: {last_failure}"
        )))
    }

    /// Exponential backoff for the given attempt, capped at
    /// [`MAX_BACKOFF_MS`] so a large retry count cannot overflow or stall
    fn backoff_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt - 1))
            .min(MAX_BACKOFF_MS)
    }

    /// Retry on 429 and transient 5xx responses only
    fn should_retry(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(self.random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("uk-UA,uk;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        headers
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}
