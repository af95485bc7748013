//! HTTP API gateway for a multi-tenant food ordering platform.
//!
//! The gateway owns the request admission pipeline (origin checks, rate
//! control, response caching, request context, error rendering) and the
//! lifecycle of the process-wide store and cache connections. Business
//! routes are mounted through [`HttpServer::with_api_routes`].

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;
pub mod store;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use http::{AppState, HttpServer};
pub use lifecycle::{Lifecycle, ShutdownOutcome};
