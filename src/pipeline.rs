//! Request pipeline.
//!
//! Every inbound request traverses [`PIPELINE`] in order before reaching a
//! handler. The router is assembled by folding the list from the innermost
//! stage outwards. The error boundary wraps every stage that can fail, so a
//! failure is rendered exactly once; only response compression sits outside
//! it, because the boundary must read error bodies before they are encoded.

use std::time::Duration;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::http::request::request_context;
use crate::http::response::error_boundary;
use crate::http::server::AppState;
use crate::security::admission::admission;
use crate::security::headers::security_headers;
use crate::security::origin::origin_guard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Encode finished responses, including rendered errors.
    Compression,
    /// Render failures from every inner stage as the JSON envelope.
    ErrorBoundary,
    /// Reject disallowed origins, then answer CORS preflights.
    OriginCheck,
    SecurityHeaders,
    /// Bound request bodies before anything reads them.
    BodyLimit,
    /// Assign the request ID and emit the access record.
    RequestContext,
    /// Ceiling, then progressive delay.
    Admission,
    /// Route to a handler, bounded by the request timeout.
    Dispatch,
}

/// Stages in the order a request traverses them.
pub const PIPELINE: &[Stage] = &[
    Stage::Compression,
    Stage::ErrorBoundary,
    Stage::OriginCheck,
    Stage::SecurityHeaders,
    Stage::BodyLimit,
    Stage::RequestContext,
    Stage::Admission,
    Stage::Dispatch,
];

impl Stage {
    #[allow(deprecated)]
    fn wrap(self, router: Router<AppState>, state: &AppState) -> Router<AppState> {
        let config = &state.config;
        match self {
            Stage::Compression => router.layer(CompressionLayer::new()),
            Stage::ErrorBoundary => {
                router.layer(middleware::from_fn_with_state(state.clone(), error_boundary))
            }
            Stage::OriginCheck => router
                .layer(state.origin_policy.cors_layer(&config.cors))
                .layer(middleware::from_fn_with_state(state.clone(), origin_guard)),
            Stage::SecurityHeaders => {
                router.layer(middleware::from_fn_with_state(state.clone(), security_headers))
            }
            Stage::BodyLimit => router
                .layer(DefaultBodyLimit::max(config.api.body_limit_bytes))
                .layer(RequestBodyLimitLayer::new(config.api.body_limit_bytes)),
            Stage::RequestContext => router
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), request_context)),
            Stage::Admission => router.layer(middleware::from_fn_with_state(state.clone(), admission)),
            Stage::Dispatch => router
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.listener.request_timeout_secs,
                ))),
        }
    }
}

/// Wrap `routes` in every pipeline stage.
pub fn assemble(routes: Router<AppState>, state: AppState) -> Router {
    PIPELINE
        .iter()
        .rev()
        .fold(routes, |router, stage| stage.wrap(router, &state))
        .with_state(state)
}
