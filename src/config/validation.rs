use super::models::{Config, FetchProfile};
use reqwest::Url;
use thiserror::Error;

/// Highest accepted `fetch.retry.max_retries`
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid URL for '{field}': {value}")]
    InvalidUrl { field: String, value: String },

    #[error("Unsupported scheme '{scheme}' for '{field}', expected http or https")]
    UnsupportedScheme { field: String, scheme: String },

    #[error("Concurrency for fetch profile '{profile}' must be at least 1")]
    ZeroConcurrency { profile: String },

    #[error("Timeout must be at least 1s: {field} = {value}")]
    InvalidTimeout { field: String, value: u64 },

    #[error("Retry backoff must be positive when max_retries = {max_retries}")]
    ZeroBackoff { max_retries: u32 },

    #[error("max_retries = {max_retries} exceeds the limit of {limit}")]
    TooManyRetries { max_retries: u32, limit: u32 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_repository(config)?;
    validate_profiles(config)?;
    validate_retry(config)?;
    Ok(())
}

fn validate_repository(config: &Config) -> Result<(), ValidationError> {
    let repository = &config.repository;
    validate_url("repository.base_url", &repository.base_url)?;
    validate_url("repository.bitstream_base_url", &repository.bitstream_base_url)?;
    validate_url("repository.handle_base_url", &repository.handle_base_url)?;
    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
    let url = Url::parse(value).map_err(|_| ValidationError::InvalidUrl {
        field: field.to_string(),
        value: value.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ValidationError::UnsupportedScheme {
            field: field.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

fn validate_profiles(config: &Config) -> Result<(), ValidationError> {
    let profiles = [
        ("listing", &config.fetch.listing),
        ("metadata", &config.fetch.metadata),
        ("files", &config.fetch.files),
    ];

    for (name, profile) in profiles {
        validate_profile(name, profile)?;
    }

    Ok(())
}

fn validate_profile(name: &str, profile: &FetchProfile) -> Result<(), ValidationError> {
    if profile.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency {
            profile: name.to_string(),
        });
    }

    for (field, value) in [
        ("connect_timeout_secs", profile.connect_timeout_secs),
        ("timeout_secs", profile.timeout_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: format!("fetch.{name}.{field}"),
                value,
            });
        }
    }

    Ok(())
}

fn validate_retry(config: &Config) -> Result<(), ValidationError> {
    let retry = &config.fetch.retry;
    if retry.max_retries > MAX_RETRIES {
        return Err(ValidationError::TooManyRetries {
            max_retries: retry.max_retries,
            limit: MAX_RETRIES,
        });
    }
    if retry.max_retries > 0 && retry.backoff_ms == 0 {
        return Err(ValidationError::ZeroBackoff {
            max_retries: retry.max_retries,
        });
    }

    Ok(())
}
