//! Managed connection state machine.
//!
//! # States
//! - Uninitialized: never attempted (e.g. Redis disabled)
//! - Connecting: connection attempt in progress
//! - Ready: handle available to borrowers
//! - Failed: attempt failed; cause recorded
//! - Closed: closed during graceful shutdown
//!
//! # State Transitions
//! ```text
//! Uninitialized → Connecting → Ready → Closed
//!                           ↘ Failed
//! ```
//!
//! Borrowers receive an `Arc` clone of the handle; only the lifecycle
//! manager closes it.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

/// Error raised while closing a connection.
#[derive(Debug, thiserror::Error)]
#[error("failed to close {name}: {message}")]
pub struct ConnectionError {
    pub name: &'static str,
    pub message: String,
}

/// A long-lived outbound connection the lifecycle manager can close.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn close(&self) -> Result<(), ConnectionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "cause")]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Ready,
    Failed(String),
    Closed,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Slot<C: ?Sized> {
    state: ConnectionState,
    handle: Option<Arc<C>>,
}

/// Process-wide connection handle with explicit state.
pub struct ManagedConnection<C: ?Sized> {
    name: &'static str,
    slot: Mutex<Slot<C>>,
}

impl<C: ?Sized + Send + Sync> ManagedConnection<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot {
                state: ConnectionState::Uninitialized,
                handle: None,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    /// Borrow the handle; `None` unless the connection is ready.
    pub fn handle(&self) -> Option<Arc<C>> {
        let slot = self.lock();
        match slot.state {
            ConnectionState::Ready => slot.handle.clone(),
            _ => None,
        }
    }

    /// Run `connect` once from `Uninitialized`.
    ///
    /// Returns `None` without calling `connect` if an attempt was already
    /// made. A failed attempt records its cause and leaves no handle.
    pub async fn connect<F, Fut, E>(&self, connect: F) -> Option<Result<Arc<C>, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<C>, E>>,
        E: fmt::Display,
    {
        {
            let mut slot = self.lock();
            if slot.state != ConnectionState::Uninitialized {
                tracing::debug!(connection = self.name, state = %slot.state, "connect skipped");
                return None;
            }
            slot.state = ConnectionState::Connecting;
        }
        tracing::info!(connection = self.name, "connecting");

        let result = connect().await;

        let mut slot = self.lock();
        match &result {
            Ok(handle) => {
                slot.state = ConnectionState::Ready;
                slot.handle = Some(Arc::clone(handle));
                tracing::info!(connection = self.name, "connection ready");
            }
            Err(e) => {
                slot.state = ConnectionState::Failed(e.to_string());
                tracing::error!(connection = self.name, error = %e, "connection failed");
            }
        }
        Some(result)
    }

    /// Move a ready connection to `Closed`, handing back the handle to close.
    pub(crate) fn take_for_close(&self) -> Option<Arc<C>> {
        let mut slot = self.lock();
        match slot.state {
            ConnectionState::Ready => {
                slot.state = ConnectionState::Closed;
                slot.handle.take()
            }
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot<C>> {
        self.slot.lock().expect("connection slot mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl Connection for Dummy {
        async fn close(&self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_happy_path_transitions() {
        let conn: ManagedConnection<dyn Connection> = ManagedConnection::new("dummy");
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        assert!(conn.handle().is_none());

        let result = conn
            .connect(|| async { Ok::<_, String>(Arc::new(Dummy) as Arc<dyn Connection>) })
            .await;
        assert!(matches!(result, Some(Ok(_))));
        assert_eq!(conn.state(), ConnectionState::Ready);
        assert!(conn.handle().is_some());

        assert!(conn.take_for_close().is_some());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.handle().is_none());
        assert!(conn.take_for_close().is_none());
    }

    #[tokio::test]
    async fn test_failure_records_cause() {
        let conn: ManagedConnection<dyn Connection> = ManagedConnection::new("dummy");
        let result = conn
            .connect(|| async { Err::<Arc<dyn Connection>, _>("connection refused") })
            .await;
        assert!(matches!(result, Some(Err("connection refused"))));
        assert_eq!(
            conn.state(),
            ConnectionState::Failed("connection refused".to_string())
        );
        assert!(conn.take_for_close().is_none());
    }

    #[tokio::test]
    async fn test_connect_runs_once() {
        let conn: ManagedConnection<dyn Connection> = ManagedConnection::new("dummy");
        conn.connect(|| async { Ok::<_, String>(Arc::new(Dummy) as Arc<dyn Connection>) })
            .await;
        let second = conn
            .connect(|| async { Ok::<_, String>(Arc::new(Dummy) as Arc<dyn Connection>) })
            .await;
        assert!(second.is_none());
    }
}
