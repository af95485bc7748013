//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method and status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): requests refused by the ceiling
//! - `gateway_delayed_total` (counter): requests slowed by the delay stage
//! - `gateway_cache_events_total` (counter): cache hit/miss/store by event
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so tests and metrics-disabled deployments pay nothing.

use std::net::SocketAddr;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
    pub const RATE_LIMITED_TOTAL: &str = "gateway_rate_limited_total";
    pub const DELAYED_TOTAL: &str = "gateway_delayed_total";
    pub const CACHE_EVENTS_TOTAL: &str = "gateway_cache_events_total";
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Prometheus metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

pub fn record_request(method: &str, status: u16, duration_ms: u64) {
    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration_ms as f64 / 1000.0);
}

pub fn record_rate_limited() {
    counter!(names::RATE_LIMITED_TOTAL).increment(1);
}

pub fn record_delayed() {
    counter!(names::DELAYED_TOTAL).increment(1);
}

pub fn record_cache_event(event: &'static str) {
    counter!(names::CACHE_EVENTS_TOTAL, "event" => event).increment(1);
}
