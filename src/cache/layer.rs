//! Response cache for idempotent reads.
//!
//! Wraps dispatch on the API router. Only `GET` requests that are not
//! multipart are considered, and the request body is never read. A `200 OK`
//! response with a bounded UTF-8 body is stored for the configured TTL and
//! replayed on later hits with its end-to-end headers. Hop-by-hop headers,
//! framing headers, cookies and the per-request ID are not stored.
//!
//! Invalidation is explicit: handlers that mutate a resource family call
//! [`ResponseCache::invalidate_family`].

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    extract::{OriginalUri, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::cache::backend::CacheBackend;
use crate::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

pub const X_CACHE: &str = "x-cache";

/// Headers that describe one hop or one exchange rather than the resource.
const UNREPLAYABLE: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "set-cookie",
    "x-request-id",
    X_CACHE,
];

/// Serialized form of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: String) -> Self {
        let headers = headers
            .iter()
            .filter(|(name, _)| !UNREPLAYABLE.contains(&name.as_str()))
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        Self {
            status: status.as_u16(),
            headers,
            body,
        }
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        headers.remove(header::CONTENT_TYPE);
        for (name, value) in self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, "Skipping unreadable cached header"),
            }
        }
        response
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    backend: CacheBackend,
    ttl: Duration,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(backend: CacheBackend, ttl: Duration, max_body_bytes: usize) -> Self {
        Self {
            backend,
            ttl,
            max_body_bytes,
        }
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }

    /// Cache key: method, path and query.
    pub fn key_for(method: &Method, uri: &Uri) -> String {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        format!("{method}:{target}")
    }

    /// Safe reads only; multipart requests are never wrapped.
    pub fn is_cacheable(request: &Request) -> bool {
        if request.method() != Method::GET {
            return false;
        }
        let multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/"));
        !multipart
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let raw = self.backend.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &CachedResponse) {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.set(key, raw, self.ttl).await,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to serialize response"),
        }
    }

    /// Drop cached reads under `path_prefix` (e.g. `/api/products`).
    pub async fn invalidate_family(&self, path_prefix: &str) -> usize {
        let removed = self
            .backend
            .invalidate_prefix(&format!("{}:{}", Method::GET, path_prefix))
            .await;
        tracing::debug!(prefix = %path_prefix, removed, "Cache family invalidated");
        removed
    }
}

/// Middleware serving cached reads and storing fresh ones.
pub async fn response_cache(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(cache) = state.cache.clone() else {
        return next.run(request).await;
    };
    if !ResponseCache::is_cacheable(&request) {
        return next.run(request).await;
    }

    // Nested routers see a stripped path; key on the path the client sent.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or_else(|| request.uri().clone());
    let key = ResponseCache::key_for(request.method(), &uri);
    if let Some(hit) = cache.get(&key).await {
        metrics::record_cache_event("hit");
        let mut response = hit.into_response();
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        return response;
    }
    metrics::record_cache_event("miss");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.extensions().get::<ApiError>().is_some() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let within_limit = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= cache.max_body_bytes as u64);
    if !within_limit {
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return ApiError::internal(format!("failed to read response body: {e}")).into_response(),
    };

    if let Ok(text) = std::str::from_utf8(&bytes) {
        let cached = CachedResponse::new(parts.status, &parts.headers, text.to_string());
        cache.set(&key, &cached).await;
        metrics::record_cache_event("store");
    }

    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_query() {
        let uri: Uri = "/api/products?page=2&sort=price".parse().unwrap();
        assert_eq!(
            ResponseCache::key_for(&Method::GET, &uri),
            "GET:/api/products?page=2&sort=price"
        );
    }

    #[test]
    fn test_only_plain_gets_are_cacheable() {
        let get = Request::builder().uri("/api/x").body(Body::empty()).unwrap();
        assert!(ResponseCache::is_cacheable(&get));

        let post = Request::builder()
            .method(Method::POST)
            .uri("/api/x")
            .body(Body::empty())
            .unwrap();
        assert!(!ResponseCache::is_cacheable(&post));

        let multipart = Request::builder()
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::empty())
            .unwrap();
        assert!(!ResponseCache::is_cacheable(&multipart));
    }

    #[test]
    fn test_replay_keeps_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        headers.append(header::VARY, HeaderValue::from_static("accept"));
        headers.append(header::VARY, HeaderValue::from_static("accept-language"));
        headers.insert(header::SET_COOKIE, HeaderValue::from_static("session=abc"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("2"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));

        let cached = CachedResponse::new(StatusCode::OK, &headers, "{}".into());
        let names: Vec<&str> = cached.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert!(!names.contains(&"set-cookie"));
        assert!(!names.contains(&"x-request-id"));

        let replayed = cached.into_response();
        let replayed = replayed.headers();
        assert_eq!(replayed.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(replayed.get_all(header::CONTENT_TYPE).iter().count(), 1);
        assert_eq!(replayed.get(header::CACHE_CONTROL).unwrap(), "max-age=60");
        assert_eq!(replayed.get_all(header::VARY).iter().count(), 2);
        assert!(replayed.get(header::SET_COOKIE).is_none());
        assert!(replayed.get("x-request-id").is_none());
    }

    #[test]
    fn test_entries_without_headers_still_decode() {
        let cached: CachedResponse = serde_json::from_str(r#"{"status":200,"body":"ok"}"#).unwrap();
        assert!(cached.headers.is_empty());
        assert_eq!(cached.body, "ok");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let backend = CacheBackend::local(10);
        backend.set("GET:/api/x", "not json".into(), Duration::from_secs(5)).await;
        let cache = ResponseCache::new(backend, Duration::from_secs(5), 1024);
        assert!(cache.get("GET:/api/x").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_family_targets_reads() {
        let cache = ResponseCache::new(CacheBackend::local(10), Duration::from_secs(5), 1024);
        let value = CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: "{}".into(),
        };
        cache.set("GET:/api/products?page=1", &value).await;
        cache.set("GET:/api/orders", &value).await;

        assert_eq!(cache.invalidate_family("/api/products").await, 1);
        assert!(cache.get("GET:/api/orders").await.is_some());
    }
}
