//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (.env, process env)
//!     → CLI flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup and never re-read per request
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    ApiConfig, CacheBackendKind, CacheConfig, CorsConfig, GatewayConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, OperatingMode, RateLimitConfig, RedisConfig,
    ShutdownConfig, SlowDownConfig, StoreConfig,
};
pub use loader::{apply_env_overrides, load_config, resolve, ConfigError};
pub use validation::{validate_config, ValidationError};
