//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use food_gateway::config::{GatewayConfig, OperatingMode};
use food_gateway::http::{AppState, HttpServer};
use food_gateway::lifecycle::Lifecycle;
use food_gateway::cache::ResponseCache;

pub const CLIENT_ADDR: ([u8; 4], u16) = ([10, 0, 0, 7], 40000);

/// Development-mode config with the in-process cache.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.mode = OperatingMode::Development;
    config.cors.allowed_origins = vec!["https://shop.example.com".to_string()];
    config.cors.wildcard_suffixes = vec!["preview.example.dev".to_string()];
    config
}

pub struct TestGateway {
    pub router: Router,
    pub lifecycle: Arc<Lifecycle>,
    pub state: AppState,
}

/// Assemble the full pipeline around `routes` without opening a store.
pub async fn gateway(config: GatewayConfig, routes: Router<AppState>) -> TestGateway {
    let lifecycle = Arc::new(Lifecycle::new(Duration::from_millis(200)));
    let cache = lifecycle.connect_cache(&config.cache).await.map(|backend| {
        ResponseCache::new(
            backend,
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_body_bytes,
        )
    });
    let server = HttpServer::new(Arc::new(config), Arc::clone(&lifecycle), cache)
        .with_api_routes(routes);
    let state = server.state().clone();
    let router = server
        .router()
        .layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)));

    TestGateway {
        router,
        lifecycle,
        state,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("not JSON ({e}): {}", self.body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

/// Assert the error envelope shape and return the request ID.
pub fn assert_error(response: &TestResponse, status: u16, label: &str) -> String {
    assert_eq!(response.status.as_u16(), status, "body: {}", response.body);
    let body = response.json();
    assert_eq!(body["error"], label);
    let request_id = body["requestId"].as_str().unwrap_or_default().to_string();
    assert!(!request_id.is_empty());
    assert_eq!(response.header("x-request-id"), Some(request_id.as_str()));
    request_id
}
