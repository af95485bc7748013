//! End-to-end behavior of the request pipeline through the assembled router.

use std::collections::HashSet;
use std::io::Read;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use flate2::read::GzDecoder;
use serde::Deserialize;
use tower::ServiceExt;

use food_gateway::config::OperatingMode;
use food_gateway::error::{ApiError, GENERIC_INTERNAL_MESSAGE};
use food_gateway::http::{AppState, RequestContext};

mod common;
use common::{assert_error, gateway, get as get_uri, send, test_config};

#[derive(Deserialize)]
struct NewOrder {
    #[allow(dead_code)]
    item: String,
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(|| async { Json(serde_json::json!([{"id": 1}])) }))
        .route(
            "/orders",
            post(|Json(order): Json<NewOrder>| async move {
                let _ = order;
                StatusCode::CREATED
            }),
        )
        .route(
            "/boom",
            get(|| async { Err::<(), _>(ApiError::internal("connection string postgres://admin:secret@db")) }),
        )
        .route(
            "/invalid",
            get(|| async { Err::<(), _>(ApiError::Validation("quantity must be positive".into())) }),
        )
        .route(
            "/whoami",
            get(|ctx: RequestContext| async move { ctx.id.to_string() }),
        )
        .route(
            "/store",
            get(|State(state): State<AppState>| async move {
                state.lifecycle.store()?;
                Ok::<_, ApiError>("unreachable")
            }),
        )
        .route(
            "/panic",
            get(|| async {
                if true {
                    panic!("handler bug");
                }
                "never"
            }),
        )
}

fn no_slowdown() -> food_gateway::GatewayConfig {
    let mut config = test_config();
    config.slow_down.enabled = false;
    config.cache.enabled = false;
    config
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_rejects_request_past_max() {
    let gw = gateway(no_slowdown(), routes()).await;

    for i in 1..=100 {
        let response = get_uri(&gw.router, "/api/products").await;
        assert_eq!(response.status, StatusCode::OK, "request {i}");
    }

    let rejected = get_uri(&gw.router, "/api/products").await;
    assert_error(&rejected, 429, "rate-limited");
    assert!(rejected.header("retry-after").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_admission_resumes_after_window() {
    let mut config = no_slowdown();
    config.rate_limit.window_secs = 60;
    config.rate_limit.max_requests = 2;
    let gw = gateway(config, routes()).await;

    assert_eq!(get_uri(&gw.router, "/api/products").await.status, StatusCode::OK);
    assert_eq!(get_uri(&gw.router, "/api/products").await.status, StatusCode::OK);
    assert_eq!(get_uri(&gw.router, "/api/products").await.status, StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(get_uri(&gw.router, "/api/products").await.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_non_decreasing_between_threshold_and_ceiling() {
    let mut config = test_config();
    config.cache.enabled = false;
    config.rate_limit.max_requests = 10;
    config.slow_down.delay_after = 5;
    config.slow_down.delay_step_ms = 500;
    let gw = gateway(config, routes()).await;

    let mut delays = Vec::new();
    for _ in 0..10 {
        let started = tokio::time::Instant::now();
        let response = get_uri(&gw.router, "/api/products").await;
        assert_eq!(response.status, StatusCode::OK);
        delays.push(started.elapsed());
    }

    assert!(delays[..5].iter().all(|d| *d < Duration::from_millis(500)));
    assert!(delays[5] >= Duration::from_millis(500));
    assert!(delays.windows(2).all(|w| w[1] >= w[0]));
    assert!(delays[9] >= Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn test_health_is_outside_admission() {
    let mut config = no_slowdown();
    config.rate_limit.max_requests = 1;
    let gw = gateway(config, routes()).await;

    for _ in 0..5 {
        assert_eq!(get_uri(&gw.router, "/health").await.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_disallowed_origin_is_denied_before_dispatch() {
    let gw = gateway(no_slowdown(), routes()).await;
    let request = Request::builder()
        .uri("/api/products")
        .header(header::ORIGIN, "https://evil.example.org")
        .body(Body::empty())
        .unwrap();

    let response = send(&gw.router, request).await;
    assert_error(&response, 403, "cross-origin-denied");
    assert!(response.header("access-control-allow-origin").is_none());
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn test_allowed_and_wildcard_origins_receive_cors_headers() {
    let gw = gateway(no_slowdown(), routes()).await;

    for origin in ["https://shop.example.com", "https://pr-42.preview.example.dev"] {
        let request = Request::builder()
            .uri("/api/products")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = send(&gw.router, request).await;
        assert_eq!(response.status, StatusCode::OK, "origin {origin}");
        assert_eq!(response.header("access-control-allow-origin"), Some(origin));
    }
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let gw = gateway(no_slowdown(), routes()).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/orders")
        .header(header::ORIGIN, "https://shop.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = send(&gw.router, request).await;
    assert!(response.status.is_success());
    assert_eq!(
        response.header("access-control-allow-origin"),
        Some("https://shop.example.com")
    );
}

#[tokio::test]
async fn test_internal_detail_shown_in_development() {
    let gw = gateway(no_slowdown(), routes()).await;
    let response = get_uri(&gw.router, "/api/boom").await;

    assert_error(&response, 500, "internal");
    assert!(response.json()["message"].as_str().unwrap().contains("postgres://"));
}

#[tokio::test]
async fn test_internal_detail_redacted_in_production() {
    let mut config = no_slowdown();
    config.mode = OperatingMode::Production;
    let gw = gateway(config, routes()).await;
    let response = get_uri(&gw.router, "/api/boom").await;

    assert_error(&response, 500, "internal");
    assert_eq!(response.json()["message"], GENERIC_INTERNAL_MESSAGE);
    assert!(!response.body.contains("secret"));
    assert!(response.header("strict-transport-security").is_some());
}

#[tokio::test]
async fn test_validation_errors_carry_details() {
    let gw = gateway(no_slowdown(), routes()).await;
    let response = get_uri(&gw.router, "/api/invalid").await;

    assert_error(&response, 400, "validation");
    assert_eq!(response.json()["details"], "quantity must be positive");
}

#[tokio::test]
async fn test_framework_rejections_are_classified() {
    let gw = gateway(no_slowdown(), routes()).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&gw.router, request).await;
    assert_error(&response, 400, "validation");
}

#[tokio::test]
async fn test_rejection_detail_survives_response_compression() {
    let gw = gateway(no_slowdown(), routes()).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::from("{not json"))
        .unwrap();

    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    let compressed = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut text = String::new();
    GzDecoder::new(&compressed[..])
        .read_to_string(&mut text)
        .unwrap();

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "validation");
    let details = body["details"].as_str().unwrap();
    assert!(
        details.contains("Failed to parse the request body as JSON"),
        "{details}"
    );
    assert!(!details.contains('\u{fffd}'));
}

#[tokio::test]
async fn test_oversized_body_is_a_validation_error() {
    let mut config = no_slowdown();
    config.api.body_limit_bytes = 16;
    let gw = gateway(config, routes()).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(r#"{{"item":"{}"}}"#, "x".repeat(64))))
        .unwrap();

    let response = send(&gw.router, request).await;
    assert_error(&response, 400, "validation");
}

#[tokio::test]
async fn test_unknown_routes_are_not_found() {
    let gw = gateway(no_slowdown(), routes()).await;

    assert_error(&get_uri(&gw.router, "/api/nope").await, 404, "not-found");
    assert_error(&get_uri(&gw.router, "/elsewhere").await, 404, "not-found");
}

#[tokio::test]
async fn test_store_not_ready_is_internal() {
    let gw = gateway(no_slowdown(), routes()).await;
    let response = get_uri(&gw.router, "/api/store").await;

    assert_error(&response, 500, "internal");
    assert!(response.json()["message"].as_str().unwrap().contains("not ready"));
}

#[tokio::test]
async fn test_panicking_handler_is_internal() {
    let gw = gateway(no_slowdown(), routes()).await;
    let response = get_uri(&gw.router, "/api/panic").await;
    assert_error(&response, 500, "internal");
}

#[tokio::test]
async fn test_request_ids_are_minted_and_unique() {
    let gw = gateway(no_slowdown(), routes()).await;
    let mut seen = HashSet::new();

    for _ in 0..20 {
        let request = Request::builder()
            .uri("/api/whoami")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let response = send(&gw.router, request).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_ne!(response.body, "client-chosen");
        assert_eq!(response.header("x-request-id"), Some(response.body.as_str()));
        assert!(seen.insert(response.body.clone()));
    }
}

#[tokio::test]
async fn test_banner_and_security_headers() {
    let gw = gateway(no_slowdown(), routes()).await;
    let response = get_uri(&gw.router, "/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("gateway"));
    assert_eq!(response.header("x-frame-options"), Some("SAMEORIGIN"));
    assert!(response.header("x-request-id").is_some());
    assert!(response.header("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_api_docs_not_found_when_unconfigured() {
    let gw = gateway(no_slowdown(), routes()).await;
    assert_error(&get_uri(&gw.router, "/api-docs").await, 404, "not-found");
}

#[tokio::test]
async fn test_api_docs_served_from_file() {
    let path = std::env::temp_dir().join(format!("gateway-docs-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, r#"{"openapi":"3.0.0"}"#).unwrap();

    let mut config = no_slowdown();
    config.api.docs_path = Some(path.to_string_lossy().to_string());
    let gw = gateway(config, routes()).await;

    let response = get_uri(&gw.router, "/api-docs").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["openapi"], "3.0.0");

    std::fs::remove_file(path).unwrap();
}
