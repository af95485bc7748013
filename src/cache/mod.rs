//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/... (not multipart)
//!     → layer.rs (key = method + path + query)
//!     → backend.rs: hit → replay stored response
//!                   miss → dispatch → store 200 OK response with TTL
//! ```
//!
//! # Design Decisions
//! - Backend (memory or Redis) is chosen once at startup
//! - Fail open: a Redis outage means misses, never errors
//! - Staleness within the TTL is acceptable; invalidation is explicit

pub mod backend;
pub mod layer;

pub use backend::{connect_redis, CacheBackend, LocalCache, RedisConnection};
pub use layer::{response_cache, CachedResponse, ResponseCache};
