//! Configuration management for docharvest
//!
//! Settings are layered:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use docharvest::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Repository: {}", config.repository.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `DOCHARVEST__<section>__<key>`:
//! - `DOCHARVEST__REPOSITORY__BASE_URL=http://localhost:8080/rest`
//! - `DOCHARVEST__FETCH__METADATA__CONCURRENCY=20`
//! - `DOCHARVEST__FETCH__RETRY__MAX_RETRIES=2`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/docharvest.toml`.
//! This can be overridden using the `DOCHARVEST_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, FetchConfig, FetchProfile, RepositoryConfig, RetryConfig, TelemetryConfig};
pub use validation::{MAX_RETRIES, ValidationError};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path plus environment overrides
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the usual locations
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let _ = dotenvy::dotenv();
                Self::load_from_path(sources::config_path(Some(path)))
            }
            None => Self::load(),
        }
    }
}
