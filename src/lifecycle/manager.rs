//! Lifecycle manager.
//!
//! Owns the process-wide connections (persistent store, external cache) and
//! the shutdown sequence. Components receive it through `AppState`; nothing
//! else opens or closes these connections.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cache::{connect_redis, CacheBackend, RedisConnection};
use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::ApiError;
use crate::lifecycle::connection::{Connection, ConnectionState, ManagedConnection};
use crate::lifecycle::shutdown::{InFlight, InFlightGuard, Shutdown, ShutdownOutcome};
use crate::store::{DocumentStore, StoreError};

/// Snapshot of connection readiness.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub store: ConnectionState,
    pub cache: ConnectionState,
    pub accepting: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.accepting && self.store.is_ready()
    }
}

pub struct Lifecycle {
    store: ManagedConnection<dyn DocumentStore>,
    cache: ManagedConnection<dyn Connection>,
    shutdown: Shutdown,
    accepting: AtomicBool,
    shutting_down: AtomicBool,
    indexes_normalized: AtomicBool,
    in_flight: Arc<InFlight>,
    drain_timeout: Duration,
    started_at: Instant,
}

impl Lifecycle {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            store: ManagedConnection::new("store"),
            cache: ManagedConnection::new("cache"),
            shutdown: Shutdown::new(),
            accepting: AtomicBool::new(true),
            shutting_down: AtomicBool::new(false),
            indexes_normalized: AtomicBool::new(false),
            in_flight: Arc::new(InFlight::default()),
            drain_timeout,
            started_at: Instant::now(),
        }
    }

    pub fn store_connection(&self) -> &ManagedConnection<dyn DocumentStore> {
        &self.store
    }

    pub fn cache_connection(&self) -> &ManagedConnection<dyn Connection> {
        &self.cache
    }

    /// Borrow the persistent store for one request.
    pub fn store(&self) -> Result<Arc<dyn DocumentStore>, ApiError> {
        self.store.handle().ok_or_else(|| {
            ApiError::internal(format!(
                "persistent store is not ready ({})",
                self.store.state()
            ))
        })
    }

    /// Connect the persistent store, then run index normalization once.
    ///
    /// Failures are logged; the gateway keeps serving and store-backed
    /// requests fail until a restart.
    pub async fn connect_store<F, Fut>(&self, connect: F, stale_indexes: &[String]) -> ConnectionState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn DocumentStore>, StoreError>>,
    {
        if let Some(Ok(store)) = self.store.connect(connect).await {
            self.normalize_indexes_once(store.as_ref(), stale_indexes).await;
        }
        self.store.state()
    }

    async fn normalize_indexes_once(&self, store: &dyn DocumentStore, stale_indexes: &[String]) {
        if self
            .indexes_normalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match store.normalize_indexes(stale_indexes).await {
            Ok(dropped) => tracing::info!(dropped, "Index normalization complete"),
            Err(e) => tracing::error!(error = %e, "Index normalization failed; continuing"),
        }
    }

    /// Select the response cache backend.
    ///
    /// Returns `None` when caching is disabled. A Redis connection failure
    /// falls back to the in-process backend.
    pub async fn connect_cache(&self, config: &CacheConfig) -> Option<CacheBackend> {
        if !config.enabled {
            tracing::info!("Response cache disabled");
            return None;
        }
        if config.backend == CacheBackendKind::Memory {
            tracing::info!("Using in-process response cache");
            return Some(CacheBackend::local(config.max_entries));
        }

        let mut pool = None;
        let slot = &mut pool;
        let redis = &config.redis;
        self.cache
            .connect(move || async move {
                let connected = connect_redis(redis).await?;
                *slot = Some(connected.clone());
                Ok::<_, String>(Arc::new(RedisConnection::new(connected)) as Arc<dyn Connection>)
            })
            .await;

        match pool {
            Some(pool) => Some(CacheBackend::redis(pool, redis)),
            None => {
                tracing::warn!("Falling back to in-process response cache");
                Some(CacheBackend::local(config.max_entries))
            }
        }
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            store: self.store.state(),
            cache: self.cache.state(),
            accepting: self.is_accepting(),
        }
    }

    /// Round-trip the persistent store.
    ///
    /// `None` when no store is ready to ask. A ping that errors or outlasts
    /// `timeout` reports `Some(false)`.
    pub async fn ping_store(&self, timeout: Duration) -> Option<bool> {
        let store = self.store.handle()?;
        match tokio::time::timeout(timeout, store.ping()).await {
            Ok(Ok(())) => Some(true),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "store ping failed");
                Some(false)
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "store ping timed out");
                Some(false)
            }
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Register a request as in flight until the guard drops.
    pub fn track_request(&self) -> InFlightGuard {
        self.in_flight.enter()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Receiver that fires when admission stops.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Run the shutdown sequence. Re-entry is ignored.
    ///
    /// 1. Stop admission and let in-flight requests drain
    /// 2. Close the cache connection (failure logged and ignored)
    /// 3. Close the persistent store (failure makes the outcome `Failed`)
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Shutdown already in progress, ignoring");
            return ShutdownOutcome::AlreadyInProgress;
        }

        tracing::info!(in_flight = self.in_flight(), "Shutdown started, admission closed");
        self.accepting.store(false, Ordering::Release);
        self.shutdown.trigger();

        let remaining = self.in_flight.drain(self.drain_timeout).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Drain timeout elapsed with requests still in flight");
        }

        if let Some(cache) = self.cache.take_for_close() {
            match cache.close().await {
                Ok(()) => tracing::info!("Cache connection closed"),
                Err(e) => tracing::warn!(error = %e, "Cache close failed; ignoring"),
            }
        }

        let mut outcome = ShutdownOutcome::Clean;
        if let Some(store) = self.store.take_for_close() {
            match store.close().await {
                Ok(()) => tracing::info!("Store connection closed"),
                Err(e) => {
                    tracing::error!(error = %e, "Store close failed");
                    outcome = ShutdownOutcome::Failed(e.to_string());
                }
            }
        }

        tracing::info!(exit_code = outcome.exit_code(), "Shutdown complete");
        outcome
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
