//! HTTP client for repository requests

use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Fetch task aborted: {0}")]
    Aborted(String),

    #[error("Invalid HTTP client configuration: {0}")]
    InvalidClient(String),
}

impl FetchError {
    /// Connection problems, timeouts and 5xx responses may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Body(_) | FetchError::Aborted(_) | FetchError::InvalidClient(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Upper bound for a single retry sleep
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Extra attempts after the first one; zero disables retry
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub verify_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            user_agent: "docharvest/0.1.0".to_string(),
            verify_tls: true,
        }
    }
}

/// A completed 2xx response
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    /// Empty when the request was issued headers-only
    pub body: Bytes,
}

impl FetchedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Thin reqwest wrapper. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));

        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(10));

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::InvalidClient(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET a URL, retrying transient failures up to `max_retries` times
    pub async fn get(&self, url: &str, read_body: bool) -> Result<FetchedResponse> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            match self.get_once(url, read_body).await {
                Ok(response) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempts <= self.config.max_retries => {
                    warn!(url, attempts, error = %e, "Request failed, retrying");

                    tokio::time::sleep(retry_delay(self.config.retry_backoff, attempts)).await;
                }
                Err(e) => {
                    if attempts > 1 {
                        warn!(url, attempts, error = %e, "Request failed after retries");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// GET once (no retry)
    async fn get_once(&self, url: &str, read_body: bool) -> Result<FetchedResponse> {
        debug!(url, "Sending request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let final_url = response.url().to_string();
        let headers = response.headers().clone();

        let body = if read_body {
            response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Body(e.to_string())
                }
            })?
        } else {
            Bytes::new()
        };

        debug!(url, status = status.as_u16(), size = body.len(), "Request completed");

        Ok(FetchedResponse {
            url: final_url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Exponential backoff after the given failed attempt, capped at [`MAX_RETRY_BACKOFF`]
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent).min(MAX_RETRY_BACKOFF)
}
