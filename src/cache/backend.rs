//! Cache backends: in-process (`DashMap`) and external (Redis).
//!
//! The backend is chosen once at startup. Every Redis round trip is bounded by
//! a timeout and any failure is logged and reported as a miss, so an outage
//! degrades to uncached serving instead of failing requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, Runtime};
use tokio::time::Instant;

use crate::config::RedisConfig;
use crate::lifecycle::connection::{Connection, ConnectionError};

const SCAN_BATCH: usize = 200;

#[derive(Debug, Clone)]
struct CachedEntry {
    data: Arc<str>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process cache with a hard entry ceiling.
#[derive(Debug)]
pub struct LocalCache {
    map: DashMap<String, CachedEntry>,
    max_entries: usize,
}

impl LocalCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            map: DashMap::new(),
            max_entries,
        }
    }

    fn get(&self, key: &str) -> Option<Arc<str>> {
        let entry = self.map.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.map.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(Arc::clone(&entry.data))
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        if self.map.len() >= self.max_entries && !self.map.contains_key(key) {
            self.map.retain(|_, e| !e.is_expired());
            if self.map.len() >= self.max_entries {
                tracing::debug!(key = %key, "local cache full, entry not stored");
                return;
            }
        }
        self.map.insert(
            key.to_string(),
            CachedEntry {
                data: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.map.len();
        self.map.retain(|k, _| !k.starts_with(prefix));
        before.saturating_sub(self.map.len())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Redis-backed shared cache.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    key_prefix: String,
    timeout: Duration,
}

impl RedisCache {
    pub fn new(pool: Pool, config: &RedisConfig) -> Self {
        Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Run `op` on a pooled connection, bounded by the round-trip timeout.
    async fn with_conn<T, F, Fut>(&self, op: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(deadpool_redis::Connection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let work = async {
            let conn = self.pool.get().await.map_err(|e| e.to_string())?;
            f(conn).await.map_err(|e| e.to_string())
        };
        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, error = %e, "Redis cache error");
                None
            }
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "Redis cache timed out");
                None
            }
        }
    }

    async fn get(&self, key: &str) -> Option<Arc<str>> {
        let key = self.namespaced(key);
        self.with_conn("GET", |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
        .flatten()
        .map(Arc::from)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let key = self.namespaced(key);
        let ttl_secs = ttl.as_secs().max(1);
        self.with_conn("SET", |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, ttl_secs).await
        })
        .await;
    }

    async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let pattern = format!("{}*", escape_glob(&self.namespaced(prefix)));
        self.with_conn("SCAN/DEL", |mut conn| async move {
            let mut cursor: u64 = 0;
            let mut removed = 0usize;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    removed += conn.del::<_, usize>(keys).await?;
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            Ok(removed)
        })
        .await
        .unwrap_or(0)
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Response cache store selected at startup.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-process: local DashMap only.
    Local(Arc<LocalCache>),

    /// Multi-process: shared Redis.
    Redis(RedisCache),
}

impl CacheBackend {
    pub fn local(max_entries: usize) -> Self {
        CacheBackend::Local(Arc::new(LocalCache::new(max_entries)))
    }

    pub fn redis(pool: Pool, config: &RedisConfig) -> Self {
        CacheBackend::Redis(RedisCache::new(pool, config))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        match self {
            CacheBackend::Local(local) => local.get(key),
            CacheBackend::Redis(redis) => redis.get(key).await,
        }
    }

    /// Store a value. Redis writes run in the background.
    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        match self {
            CacheBackend::Local(local) => local.set(key, value, ttl),
            CacheBackend::Redis(redis) => {
                let redis = redis.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    redis.set(&key, value, ttl).await;
                });
            }
        }
    }

    /// Remove every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        match self {
            CacheBackend::Local(local) => local.invalidate_prefix(prefix),
            CacheBackend::Redis(redis) => redis.invalidate_prefix(prefix).await,
        }
    }
}

/// Lifecycle handle for the Redis pool.
pub struct RedisConnection {
    pool: Pool,
}

impl RedisConnection {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn close(&self) -> Result<(), ConnectionError> {
        self.pool.close();
        Ok(())
    }
}

/// Create the Redis pool and verify one connection.
pub async fn connect_redis(config: &RedisConfig) -> Result<Pool, String> {
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| format!("failed to create Redis pool: {e}"))?;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| format!("failed to connect to Redis: {e}"))?;
    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| format!("Redis PING failed: {e}"))?;

    Ok(pool)
}
