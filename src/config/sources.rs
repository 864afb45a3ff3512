use super::models::{Config, FetchConfig};
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DOCHARVEST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/docharvest.toml";
const ENV_PREFIX: &str = "DOCHARVEST";
const ENV_SEPARATOR: &str = "__";

/// Resolve the config file path: explicit argument, then `DOCHARVEST_CONFIG`,
/// then the default location
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. `.env` file (via dotenvy) and process environment
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    load_from_sources(config_path(None))
}

/// Load from a specific file plus environment overrides
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = profile_defaults(config::Config::builder())?;

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // DOCHARVEST__FETCH__METADATA__CONCURRENCY -> fetch.metadata.concurrency
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// Seed every fetch profile key so that a partial override (one key from the
/// environment, say) still deserializes
fn profile_defaults(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let defaults = FetchConfig::default();
    for (name, profile) in [
        ("listing", defaults.listing),
        ("metadata", defaults.metadata),
        ("files", defaults.files),
    ] {
        builder = builder
            .set_default(
                format!("fetch.{name}.connect_timeout_secs"),
                profile.connect_timeout_secs,
            )?
            .set_default(format!("fetch.{name}.timeout_secs"), profile.timeout_secs)?
            .set_default(format!("fetch.{name}.concurrency"), profile.concurrency as u64)?;
    }
    Ok(builder)
}
