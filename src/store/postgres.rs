//! PostgreSQL-backed document store.
//!
//! One pool is opened eagerly at startup and shared by every request; it is
//! never reconnected per request.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::validation::is_identifier;
use crate::config::StoreConfig;
use crate::lifecycle::connection::{Connection, ConnectionError};
use crate::store::{DocumentStore, StoreError};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open the pool and verify one connection.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        tracing::info!(
            max_connections = config.max_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Connection for PostgresStore {
    async fn close(&self) -> Result<(), ConnectionError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn normalize_indexes(&self, stale: &[String]) -> Result<usize, StoreError> {
        let mut dropped = 0;
        for name in stale {
            if !is_identifier(name) {
                return Err(StoreError::InvalidIndex(name.clone()));
            }
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)",
            )
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                continue;
            }

            // Identifiers cannot be bound; the name was validated above.
            sqlx::query(&format!("DROP INDEX IF EXISTS \"{name}\""))
                .execute(&self.pool)
                .await?;
            tracing::info!(index = %name, "Dropped stale index");
            dropped += 1;
        }
        Ok(dropped)
    }
}
