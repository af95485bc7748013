//! Persistent document store.
//!
//! The gateway only opens, holds and closes the store; schema and queries
//! belong to the route handlers mounted under the API prefix.

pub mod postgres;

use async_trait::async_trait;

use crate::lifecycle::connection::Connection;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid index name '{0}'")]
    InvalidIndex(String),
}

/// Trait for persistent store backends.
#[async_trait]
pub trait DocumentStore: Connection {
    /// Round trip to the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Drop stale indexes left by earlier schema versions.
    ///
    /// Returns how many of `stale` were present and removed.
    async fn normalize_indexes(&self, stale: &[String]) -> Result<usize, StoreError>;
}

pub use postgres::PostgresStore;
