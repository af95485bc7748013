//! Per-request context.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) before any business logic runs
//! - Attach a [`RequestContext`] to the in-flight request
//! - Echo the ID in `X-Request-Id` and record it on the request span
//! - Emit one structured completion record per request
//!
//! # Design Decisions
//! - Client-supplied request IDs are replaced, never trusted
//! - The ID is also stored in response extensions so the error boundary,
//!   which runs outside this layer, can correlate its records

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Opaque process-unique request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity and timing of one in-flight request. Immutable once assigned.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: RequestId,
    pub method: Method,
    pub path: String,
    pub received_at: DateTime<Utc>,
    started: Instant,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method,
            path: path.into(),
            received_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal("request context not assigned"))
    }
}

/// Assign the request context, then log the completed request.
pub async fn request_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let _in_flight = state.lifecycle.track_request();

    let ctx = RequestContext::new(request.method().clone(), request.uri().path());
    let header_value = HeaderValue::from_str(ctx.id.as_str()).ok();
    match &header_value {
        Some(value) => {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
        }
        None => {
            request.headers_mut().remove(X_REQUEST_ID);
        }
    }
    request.extensions_mut().insert(ctx.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ctx.id,
        method = %ctx.method,
        path = %ctx.path,
    );

    tracing::debug!(parent: &span, received_at = %ctx.received_at.to_rfc3339(), "request started");

    let mut response = next.run(request).instrument(span).await;

    let status = response.status().as_u16();
    let duration_ms = ctx.elapsed_ms();
    if let Some(value) = header_value {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response.extensions_mut().insert(ctx.id.clone());

    tracing::info!(
        target: "food_gateway::access",
        request_id = %ctx.id,
        method = %ctx.method,
        path = %ctx.path,
        status = status,
        duration_ms = duration_ms,
        "request completed"
    );
    metrics::record_request(ctx.method.as_str(), status, duration_ms);

    response
}
