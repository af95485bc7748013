//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect store → Normalize indexes (once) → Select cache backend
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → manager.rs shutdown sequence
//!
//! Shutdown (manager.rs + shutdown.rs):
//!     Stop admission → Drain in-flight → Close cache → Close store → Exit code
//! ```
//!
//! # Design Decisions
//! - Connections are opened once and shared; handlers never open their own
//! - Connection failures at startup degrade the gateway instead of exiting
//! - Shutdown is idempotent; a second request is logged and ignored
//! - Only a store close failure produces a non-zero exit code

pub mod connection;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use connection::{Connection, ConnectionError, ConnectionState, ManagedConnection};
pub use manager::{Lifecycle, Readiness};
pub use shutdown::{InFlight, InFlightGuard, Shutdown, ShutdownOutcome};
