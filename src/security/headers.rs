//! Security response headers.
//!
//! # Responsibilities
//! - Add hardening headers to every response
//! - Add HSTS in production only (development runs over plain HTTP)
//!
//! # Design Decisions
//! - Headers already set by a handler are left untouched
//! - `Cross-Origin-Resource-Policy: cross-origin` because browser clients on
//!   allowed origins must be able to read API responses

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

const BASELINE: [(HeaderName, &str); 7] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::X_DNS_PREFETCH_CONTROL, "off"),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'; frame-ancestors 'self'; object-src 'none'"),
    (HeaderName::from_static("cross-origin-resource-policy"), "cross-origin"),
    (HeaderName::from_static("x-permitted-cross-domain-policies"), "none"),
];

const HSTS: &str = "max-age=15552000; includeSubDomains";

pub async fn security_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply(response.headers_mut(), state.config.is_production());
    response
}

pub(crate) fn apply(headers: &mut axum::http::HeaderMap, production: bool) {
    for (name, value) in BASELINE {
        headers
            .entry(name)
            .or_insert(HeaderValue::from_static(value));
    }
    if production {
        headers
            .entry(header::STRICT_TRANSPORT_SECURITY)
            .or_insert(HeaderValue::from_static(HSTS));
    }
    headers.remove(header::SERVER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_baseline_headers_applied() {
        let mut headers = HeaderMap::new();
        apply(&mut headers, false);
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_hsts_only_in_production_and_existing_values_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        apply(&mut headers, true);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], HSTS);
    }
}
