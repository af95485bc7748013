//! Admission controller.
//!
//! Composes the ceiling stage ([`RateLimiter`]) and the delay stage
//! ([`SlowDown`]) for requests under a configured route prefix. The decision
//! itself ([`AdmissionController::decide`]) is a plain function of the client
//! key; the middleware only applies it.
//!
//! # Cancellation
//! The delay is a `tokio::time::sleep` inside the request future. If the
//! client disconnects the future is dropped, and the sleep with it.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::slow_down::SlowDown;

/// Outcome of admission for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Delay(Duration),
    Reject(ApiError),
}

#[derive(Debug)]
pub struct AdmissionController {
    prefix: String,
    trust_forwarded_for: bool,
    limiter: Option<RateLimiter>,
    slow_down: Option<SlowDown>,
}

impl AdmissionController {
    pub fn new(
        prefix: impl Into<String>,
        limiter: Option<RateLimiter>,
        slow_down: Option<SlowDown>,
    ) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            trust_forwarded_for: false,
            limiter,
            slow_down,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let window = Duration::from_secs(config.rate_limit.window_secs);
        let limiter = config
            .rate_limit
            .enabled
            .then(|| RateLimiter::new(window, config.rate_limit.max_requests));
        let slow_down = config.slow_down.enabled.then(|| {
            SlowDown::new(
                window,
                config.slow_down.delay_after,
                Duration::from_millis(config.slow_down.delay_step_ms),
            )
        });

        let mut controller = Self::new(config.rate_limit.path_prefix.clone(), limiter, slow_down);
        controller.trust_forwarded_for = config.rate_limit.trust_forwarded_for;
        controller
    }

    /// Whether `path` falls under the controlled prefix.
    pub fn applies_to(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Ceiling first; a rejected request is not counted by the delay stage.
    pub fn decide(&self, key: &str) -> Admission {
        if let Some(limiter) = &self.limiter {
            if let Err(err) = limiter.check(key) {
                return Admission::Reject(err);
            }
        }
        match &self.slow_down {
            Some(stage) => match stage.delay_for(key) {
                Duration::ZERO => Admission::Admit,
                delay => Admission::Delay(delay),
            },
            None => Admission::Admit,
        }
    }

    /// Client identity: forwarded address when trusted, else the peer IP.
    pub fn client_key(&self, request: &Request) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(addr) = forwarded {
                return addr.to_string();
            }
        }
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Middleware applying admission control to the configured prefix.
pub async fn admission(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let controller = &state.admission;
    if !controller.applies_to(request.uri().path()) {
        return next.run(request).await;
    }
    if !state.lifecycle.is_accepting() {
        return ApiError::Unavailable.into_response();
    }

    let key = controller.client_key(&request);
    match controller.decide(&key) {
        Admission::Admit => next.run(request).await,
        Admission::Delay(delay) => {
            tracing::debug!(client = %key, delay_ms = delay.as_millis() as u64, "Delaying request");
            metrics::record_delayed();
            tokio::time::sleep(delay).await;
            next.run(request).await
        }
        Admission::Reject(err) => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            err.into_response()
        }
    }
}
