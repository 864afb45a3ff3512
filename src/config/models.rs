use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fetcher::HttpConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Remote repository endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// REST API root
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prefix for binary file URLs (`{prefix}/handle/{handle}/{id}?sequence=1`)
    #[serde(default = "default_bitstream_base_url")]
    pub bitstream_base_url: String,
    /// Prefix for human-facing item links (`{prefix}/handle/{handle}`)
    #[serde(default = "default_handle_base_url")]
    pub handle_base_url: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bitstream_base_url: default_bitstream_base_url(),
            handle_base_url: default_handle_base_url(),
            verify_tls: default_verify_tls(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://opendocs.ids.ac.uk/rest".to_string()
}

fn default_bitstream_base_url() -> String {
    "https://opendocs.ids.ac.uk/opendocs/bitstream".to_string()
}

fn default_handle_base_url() -> String {
    "http://opendocs.ids.ac.uk/opendocs".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_user_agent() -> String {
    concat!("docharvest/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Request profiles, one per kind of batch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_listing_profile")]
    pub listing: FetchProfile,
    #[serde(default = "default_metadata_profile")]
    pub metadata: FetchProfile,
    #[serde(default = "default_files_profile")]
    pub files: FetchProfile,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_profile(),
            metadata: default_metadata_profile(),
            files: default_files_profile(),
            retry: RetryConfig::default(),
        }
    }
}

/// Timeouts and in-flight cap for one kind of batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FetchProfile {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

fn default_listing_profile() -> FetchProfile {
    FetchProfile {
        connect_timeout_secs: 15,
        timeout_secs: 30,
        concurrency: 100,
    }
}

fn default_metadata_profile() -> FetchProfile {
    FetchProfile {
        connect_timeout_secs: 15,
        timeout_secs: 15,
        concurrency: 100,
    }
}

fn default_files_profile() -> FetchProfile {
    FetchProfile {
        connect_timeout_secs: 15,
        timeout_secs: 15,
        concurrency: 50,
    }
}

/// Retry of transient failures; `max_retries = 0` disables it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_backoff_ms() -> u64 {
    500
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Transport settings for one request profile
    pub fn http_config(&self, profile: &FetchProfile) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(profile.connect_timeout_secs),
            request_timeout: Duration::from_secs(profile.timeout_secs),
            max_retries: self.fetch.retry.max_retries,
            retry_backoff: Duration::from_millis(self.fetch.retry.backoff_ms),
            user_agent: self.repository.user_agent.clone(),
            verify_tls: self.repository.verify_tls,
        }
    }
}
