//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, thresholds below ceilings)
//! - Check origins and index names are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    if !names_path_segment(&config.api.mount_prefix) {
        errors.push(ValidationError::new(
            "api.mount_prefix",
            "must start with '/' and name a path segment",
        ));
    }

    for origin in &config.cors.allowed_origins {
        if url::Url::parse(origin).map(|u| u.host_str().is_none()).unwrap_or(true) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{origin}' is not an origin"),
            ));
        }
    }
    for suffix in &config.cors.wildcard_suffixes {
        if suffix.trim_start_matches('.').is_empty() || suffix.contains('/') {
            errors.push(ValidationError::new(
                "cors.wildcard_suffixes",
                format!("'{suffix}' is not a domain suffix"),
            ));
        }
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }
    if config.rate_limit.enabled && config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if !names_path_segment(&config.rate_limit.path_prefix) {
        errors.push(ValidationError::new(
            "rate_limit.path_prefix",
            "must start with '/' and name a path segment",
        ));
    }
    if config.rate_limit.enabled
        && config.slow_down.enabled
        && config.slow_down.delay_after >= config.rate_limit.max_requests
    {
        errors.push(ValidationError::new(
            "slow_down.delay_after",
            "must be below rate_limit.max_requests",
        ));
    }

    if config.cache.enabled && config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be > 0"));
    }

    if config.store.max_connections == 0 {
        errors.push(ValidationError::new("store.max_connections", "must be > 0"));
    }
    for index in &config.store.stale_indexes {
        if !is_identifier(index) {
            errors.push(ValidationError::new(
                "store.stale_indexes",
                format!("'{index}' is not a plain identifier"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A route prefix that still names a segment once trailing slashes are
/// stripped (`/api`, `/api/`; not `/` or `//`).
fn names_path_segment(prefix: &str) -> bool {
    let trimmed = prefix.trim_end_matches('/');
    trimmed.starts_with('/') && trimmed.len() > 1
}

/// Letters, digits and underscores, not starting with a digit.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
