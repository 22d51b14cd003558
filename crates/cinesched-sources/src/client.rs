//! `SourceClient` - polite HTTP client shared by the extractors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use crate::rate_limiter::{DEFAULT_MIN_INTERVAL, RateLimiter};

/// Maximum number of retries per request.
const MAX_RETRIES: u32 = 3;

/// Default delay between retries.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for one cinema source.
#[derive(Debug, Clone)]
pub struct SourceClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Rate limiter shared by clones of this client.
    rate_limiter: Arc<Mutex<RateLimiter>>,
    /// Delay between retries when the server gives no `Retry-After`.
    retry_delay: Duration,
}

/// Builder for `SourceClient`.
#[derive(Debug)]
pub struct SourceClientBuilder {
    user_agent: Option<String>,
    min_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    retry_delay: Option<Duration>,
}

impl SourceClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            user_agent: None,
            min_interval: None,
            request_timeout: None,
            retry_delay: None,
        }
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the minimum request interval (default: 500ms).
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Sets the per-request timeout (default: 20s).
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the retry delay (default: 2s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<SourceClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()
            .context("failed to build HTTP client")?;

        let rate_limiter = RateLimiter::new(self.min_interval.unwrap_or(DEFAULT_MIN_INTERVAL));

        Ok(SourceClient {
            http_client,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

impl SourceClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> SourceClientBuilder {
        SourceClientBuilder::new()
    }

    /// Per-request timeout that lets every attempt of one request fit in
    /// `budget`, capped at the default of 20s.
    #[must_use]
    pub fn request_timeout_within(budget: Duration) -> Duration {
        budget
            .checked_div(MAX_RETRIES.saturating_add(1))
            .unwrap_or(budget)
            .min(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Fetches `url` and returns the response body.
    ///
    /// Transport errors, 5xx and 429 are retried up to `MAX_RETRIES` times
    /// (429 honours `Retry-After`). Any other non-success status fails
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails after retries or the
    /// server answers with a client error.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_text(&self, url: &Url, query: &[(&str, String)]) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.wait().await;

            let send_result = self.http_client.get(url.clone()).query(query).send().await;
            let response = match send_result {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Request failed, will retry");
                    last_err = Some(anyhow::Error::new(e).context(format!("GET {url} failed")));
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();
            tracing::trace!(%status, headers = ?response.headers(), "Response headers");

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map_or(self.retry_delay, |secs| {
                        Duration::from_secs(secs.saturating_add(1))
                    });

                tracing::warn!(
                    attempt,
                    code = status.as_u16(),
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limited, waiting before retry"
                );
                last_err = Some(anyhow::anyhow!("GET {url} rate limited (HTTP {status})"));
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if status.is_server_error() {
                tracing::warn!(attempt, code = status.as_u16(), "Server error, will retry");
                last_err = Some(anyhow::anyhow!("GET {url} returned HTTP {status}"));
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                bail!("GET {url} returned HTTP {status}");
            }

            match response.text().await {
                Ok(body) => {
                    tracing::debug!(body_len = body.len(), "Response body received");
                    return Ok(body);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to read response body, will retry");
                    last_err = Some(
                        anyhow::Error::new(e).context(format!("failed to read body of {url}")),
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("GET {url} failed after retries")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client() -> SourceClient {
        SourceClient::builder()
            .user_agent("cinesched-test/0.0.0")
            .min_interval(Duration::ZERO)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = SourceClient::builder().build();

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_request_timeout_within_budget() {
        // Arrange & Act & Assert
        assert_eq!(
            SourceClient::request_timeout_within(Duration::from_secs(30)),
            Duration::from_millis(7500)
        );
        assert_eq!(
            SourceClient::request_timeout_within(Duration::from_secs(300)),
            DEFAULT_REQUEST_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_get_text_sends_query() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/showtimes"))
            .and(query_param("date", "2024-06-12"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        let url = Url::parse(&format!("{}/showtimes", server.uri())).unwrap();

        // Act
        let body = test_client()
            .get_text(&url, &[("date", String::from("2024-06-12"))])
            .await
            .unwrap();

        // Assert
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_get_text_retries_server_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;
        let url = Url::parse(&server.uri()).unwrap();

        // Act
        let body = test_client().get_text(&url, &[]).await.unwrap();

        // Assert
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_get_text_does_not_retry_client_error() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        let url = Url::parse(&server.uri()).unwrap();

        // Act
        let result = test_client().get_text(&url, &[]).await;

        // Assert
        assert!(result.unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_get_text_gives_up_after_retries() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(u64::from(MAX_RETRIES) + 1)
            .mount(&server)
            .await;
        let url = Url::parse(&server.uri()).unwrap();

        // Act
        let result = test_client().get_text(&url, &[]).await;

        // Assert
        assert!(result.unwrap_err().to_string().contains("500"));
    }
}
