//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the startup configuration: file (if any), then process environment.
///
/// The result is validated once and never re-read.
pub fn resolve(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply recognized environment overrides using `lookup` as the source.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port = parse_env("PORT", &port)?;
        config.listener.set_port(port);
    }
    if let Some(mode) = lookup("GATEWAY_MODE") {
        config.mode = mode
            .parse()
            .map_err(|message| ConfigError::Env { var: "GATEWAY_MODE", message })?;
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.store.url = url;
    }
    if let Some(url) = lookup("REDIS_URL") {
        config.cache.redis.url = url;
    }
    if let Some(backend) = lookup("CACHE_BACKEND") {
        config.cache.backend = backend
            .parse()
            .map_err(|message| ConfigError::Env { var: "CACHE_BACKEND", message })?;
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.cors.allowed_origins = split_list(&origins);
    }
    if let Some(suffixes) = lookup("ALLOWED_ORIGIN_SUFFIXES") {
        config.cors.wildcard_suffixes = split_list(&suffixes);
    }
    if let Some(flag) = lookup("LOG_TO_FILE") {
        config.observability.file_logging = parse_env("LOG_TO_FILE", &flag)?;
    }
    if let Some(window) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", &window)?;
    }
    if let Some(max) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX", &max)?;
    }
    Ok(())
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
