//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, gateway endpoints, API mount)
//!     → response.rs (error boundary, inside compression)
//!     → [pipeline stages]
//!     → request.rs (request ID, context, access record)
//!     → handler
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, RequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
