//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request context middleware and pipeline stages produce:
//!     → logging.rs (one structured access record per request)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (JSON in production) and optional log file
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - The request ID is attached to the request span, so every record
//!   emitted while handling a request carries it
//! - Metrics are inert until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
