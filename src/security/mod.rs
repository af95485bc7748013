//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (reject disallowed origins, CORS headers)
//!     → headers.rs (hardening response headers)
//!     → [compression, body limit, request context]
//!     → admission.rs (ceiling stage: rate_limit.rs, delay stage: slow_down.rs)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - Origin and admission failures never reach handler code
//! - Decisions are plain functions; middleware wrappers only apply them
//! - Admission applies to the API prefix only, never to /health

pub mod admission;
pub mod headers;
pub mod origin;
pub mod rate_limit;
pub mod slow_down;

pub use admission::{Admission, AdmissionController};
pub use origin::OriginPolicy;
pub use rate_limit::RateLimiter;
pub use slow_down::SlowDown;
