//! Origin validation.
//!
//! Decides whether a request's declared `Origin` may receive a cross-origin
//! response. Rules, in order:
//! 1. No origin (non-browser client) → allow
//! 2. Exact match against the allow-list → allow
//! 3. Host is a subdomain of a configured wildcard suffix → allow
//! 4. Otherwise → deny with `cross-origin-denied`
//!
//! The same policy drives the CORS response headers so the two can never
//! disagree.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::error::ApiError;
use crate::http::request::X_REQUEST_ID;
use crate::http::server::AppState;

/// Immutable allowed-origin set.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    exact: Vec<String>,
    suffixes: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, J>(origins: I, suffixes: J) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        J: IntoIterator,
        J::Item: AsRef<str>,
    {
        Self {
            exact: origins
                .into_iter()
                .map(|o| normalize_origin(o.as_ref()))
                .collect(),
            suffixes: suffixes
                .into_iter()
                .map(|s| {
                    s.as_ref()
                        .trim()
                        .trim_start_matches('*')
                        .trim_start_matches('.')
                        .to_ascii_lowercase()
                })
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(&config.allowed_origins, &config.wildcard_suffixes)
    }

    /// Pure admission decision for an optional origin.
    pub fn check(&self, origin: Option<&str>) -> Result<(), ApiError> {
        match origin {
            None => Ok(()),
            Some(origin) if self.is_allowed(origin) => Ok(()),
            Some(origin) => Err(ApiError::CrossOriginDenied {
                origin: origin.to_string(),
            }),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let normalized = normalize_origin(origin);
        if self.exact.iter().any(|allowed| *allowed == normalized) {
            return true;
        }
        if self.suffixes.is_empty() {
            return false;
        }

        let Ok(url) = url::Url::parse(&normalized) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        self.suffixes.iter().any(|suffix| {
            host.len() > suffix.len() + 1
                && host.ends_with(suffix.as_str())
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
        })
    }

    /// CORS headers for allowed origins, driven by this policy.
    pub fn cors_layer(self: &Arc<Self>, config: &CorsConfig) -> CorsLayer {
        let policy = Arc::clone(self);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    origin.to_str().map(|o| policy.is_allowed(o)).unwrap_or(false)
                },
            ))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_REQUEST_ID])
            .expose_headers([X_REQUEST_ID, header::RETRY_AFTER])
            .allow_credentials(config.allow_credentials)
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Reject requests whose origin is not allowed, before anything else runs.
pub async fn origin_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or("<invalid>").to_string());

    match state.origin_policy.check(origin.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::debug!(origin = ?origin, "origin denied");
            err.into_response()
        }
    }
}
