//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Operating mode (controls error verbosity and log format).
    pub mode: OperatingMode,

    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// API mount point and body limits.
    pub api: ApiConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Ceiling stage of admission control.
    pub rate_limit: RateLimitConfig,

    /// Delay stage of admission control.
    pub slow_down: SlowDownConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Persistent document store.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown sequencing.
    pub shutdown: ShutdownConfig,
}

impl GatewayConfig {
    pub fn is_production(&self) -> bool {
        self.mode == OperatingMode::Production
    }
}

/// Production hides internal error detail from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Production,
    #[default]
    Development,
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" => Ok(Self::Development),
            other => Err(format!("unknown operating mode '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{host}:{port}");
    }
}

/// Where business routes are mounted and how large bodies may be.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Path prefix the API router is nested under.
    pub mount_prefix: String,

    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,

    /// Optional OpenAPI document served at `/api-docs`.
    pub docs_path: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            mount_prefix: "/api".to_string(),
            body_limit_bytes: 10 * 1024 * 1024, // 10MB
            docs_path: None,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins, e.g. "https://shop.example.com".
    pub allowed_origins: Vec<String>,

    /// Domain suffixes whose subdomains are allowed, e.g. "vercel.app".
    pub wildcard_suffixes: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            wildcard_suffixes: Vec::new(),
            allow_credentials: true,
        }
    }
}

/// Ceiling stage: hard rejection once a key exceeds `max_requests` per window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable the ceiling stage.
    pub enabled: bool,

    /// Route prefix the admission controller applies to.
    pub path_prefix: String,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per key per window.
    pub max_requests: u32,

    /// Use the first `X-Forwarded-For` entry as client identity.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/api".to_string(),
            window_secs: 15 * 60,
            max_requests: 100,
            trust_forwarded_for: false,
        }
    }
}

/// Delay stage: progressive slowdown above `delay_after` requests per window.
///
/// Shares the window length and route prefix of [`RateLimitConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SlowDownConfig {
    /// Enable the delay stage.
    pub enabled: bool,

    /// Requests per window admitted without delay.
    pub delay_after: u32,

    /// Added delay per request over the threshold, in milliseconds.
    pub delay_step_ms: u64,
}

impl Default for SlowDownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_after: 50,
            delay_step_ms: 500,
        }
    }
}

/// Which store backs the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

impl std::str::FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "local" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable response caching for GET routes.
    pub enabled: bool,

    /// Backend selected at startup.
    pub backend: CacheBackendKind,

    /// Time-to-live for cached responses in seconds.
    pub ttl_secs: u64,

    /// Entry ceiling for the in-process backend.
    pub max_entries: usize,

    /// Largest response body that will be cached, in bytes.
    pub max_body_bytes: usize,

    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            ttl_secs: 60,
            max_entries: 10_000,
            max_body_bytes: 1024 * 1024,
            redis: RedisConfig::default(),
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,

    /// Pool size.
    pub pool_size: usize,

    /// Connect/round-trip timeout in milliseconds.
    pub timeout_ms: u64,

    /// Namespace prepended to every key.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 8,
            timeout_ms: 250,
            key_prefix: "gateway:cache:".to_string(),
        }
    }
}

/// Persistent document store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string.
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Indexes dropped once after the store becomes ready.
    pub stale_indexes: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/food".to_string(),
            max_connections: 10,
            connect_timeout_secs: 5,
            stale_indexes: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format; defaults by operating mode when unset.
    pub log_format: Option<LogFormat>,

    /// Also append log records to `<log_dir>/gateway.log`.
    pub file_logging: bool,

    /// Directory for file logging.
    pub log_dir: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: None,
            file_logging: false,
            log_dir: "logs".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may drain before connections are closed.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.slow_down.delay_after, 50);
        assert_eq!(config.slow_down.delay_step_ms, 500);
        assert_eq!(config.api.mount_prefix, "/api");
        assert!(!config.is_production());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            mode = "production"

            [rate_limit]
            max_requests = 10

            [cache]
            backend = "redis"
            "#,
        )
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.ttl_secs, 60);
    }

    #[test]
    fn test_set_port_keeps_host() {
        let mut listener = ListenerConfig::default();
        listener.set_port(8088);
        assert_eq!(listener.bind_address, "0.0.0.0:8088");
    }
}
