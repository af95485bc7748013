//! Startup orchestration.
//!
//! Connects the persistent store, runs index normalization once, then
//! selects the response cache backend. Neither failure is fatal: the
//! listener still starts and `/health` reports the degraded connection.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::config::GatewayConfig;
use crate::lifecycle::manager::Lifecycle;
use crate::store::{DocumentStore, PostgresStore, StoreError};

/// Open outbound connections. Returns the response cache when enabled.
pub async fn start(config: &GatewayConfig, lifecycle: &Lifecycle) -> Option<ResponseCache> {
    let store_config = &config.store;
    let state = lifecycle
        .connect_store(
            || async move {
                let store = PostgresStore::connect(store_config).await?;
                Ok::<_, StoreError>(Arc::new(store) as Arc<dyn DocumentStore>)
            },
            &store_config.stale_indexes,
        )
        .await;
    tracing::info!(store = %state, "Persistent store initialized");

    let cache_config = &config.cache;
    lifecycle.connect_cache(cache_config).await.map(|backend| {
        tracing::info!(
            backend = backend.kind(),
            ttl_secs = cache_config.ttl_secs,
            "Response cache ready"
        );
        ResponseCache::new(
            backend,
            Duration::from_secs(cache_config.ttl_secs),
            cache_config.max_body_bytes,
        )
    })
}
