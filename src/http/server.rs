//! HTTP server setup.
//!
//! # Responsibilities
//! - Build [`AppState`] from the resolved configuration and lifecycle
//! - Mount gateway endpoints (`/health`, `/`, `/api-docs`)
//! - Mount externally supplied API routes under the configured prefix,
//!   wrapped by the response cache
//! - Assemble the middleware pipeline and serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::cache::{response_cache, ResponseCache};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::lifecycle::{Lifecycle, Readiness};
use crate::pipeline;
use crate::security::{AdmissionController, OriginPolicy};

/// Shared state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub lifecycle: Arc<Lifecycle>,
    pub origin_policy: Arc<OriginPolicy>,
    pub admission: Arc<AdmissionController>,
    pub cache: Option<ResponseCache>,
}

impl AppState {
    pub fn new(
        config: Arc<GatewayConfig>,
        lifecycle: Arc<Lifecycle>,
        cache: Option<ResponseCache>,
    ) -> Self {
        Self {
            origin_policy: Arc::new(OriginPolicy::from_config(&config.cors)),
            admission: Arc::new(AdmissionController::from_config(&config)),
            config,
            lifecycle,
            cache,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
    api_routes: Router<AppState>,
}

impl HttpServer {
    pub fn new(
        config: Arc<GatewayConfig>,
        lifecycle: Arc<Lifecycle>,
        cache: Option<ResponseCache>,
    ) -> Self {
        Self {
            state: AppState::new(config, lifecycle, cache),
            api_routes: Router::new(),
        }
    }

    /// Mount business routes under the API prefix. Paths are relative to
    /// the prefix, e.g. `/products` serves `/api/products`.
    pub fn with_api_routes(mut self, routes: Router<AppState>) -> Self {
        self.api_routes = self.api_routes.merge(routes);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully assembled router.
    pub fn router(&self) -> Router {
        let prefix = self.state.config.api.mount_prefix.trim_end_matches('/');

        let api = self
            .api_routes
            .clone()
            .layer(middleware::from_fn_with_state(self.state.clone(), response_cache))
            .fallback(api_not_found);

        let routes = Router::new()
            .route("/", get(banner))
            .route("/health", get(health))
            .route("/api-docs", get(api_docs))
            .nest(prefix, api)
            .fallback(api_not_found);

        pipeline::assemble(routes, self.state.clone())
    }

    /// Serve until the lifecycle stops admission.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.state.config.mode,
            cache = self.state.cache.as_ref().map(|c| c.backend().kind()).unwrap_or("disabled"),
            "HTTP server starting"
        );

        let mut stop = self.state.lifecycle.subscribe();
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                match stop.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
                }
                tracing::info!("HTTP server no longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Upper bound on the store round-trip made by `/health`.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    connections: Readiness,
    store_reachable: Option<bool>,
}

async fn health(State(state): State<AppState>) -> Response {
    let readiness = state.lifecycle.readiness();
    let store_reachable = if readiness.accepting {
        state.lifecycle.ping_store(HEALTH_PING_TIMEOUT).await
    } else {
        None
    };
    let (code, status) = match (readiness.accepting, readiness.is_ready(), store_reachable) {
        (false, _, _) => (StatusCode::SERVICE_UNAVAILABLE, "shutting-down"),
        (true, true, Some(true)) => (StatusCode::OK, "ok"),
        (true, _, _) => (StatusCode::OK, "degraded"),
    };
    let body = HealthBody {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.lifecycle.uptime().as_secs(),
        connections: readiness,
        store_reachable,
    };
    (code, Json(body)).into_response()
}

async fn banner() -> &'static str {
    concat!("Food ordering API gateway v", env!("CARGO_PKG_VERSION"))
}

async fn api_docs(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state
        .config
        .api
        .docs_path
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("API documentation is not configured".into()))?;

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let content_type = if path.ends_with(".yaml") || path.ends_with(".yml") {
                "application/yaml"
            } else {
                "application/json"
            };
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("API documentation is not available".into()))
        }
        Err(e) => Err(ApiError::internal(format!("failed to read {path}: {e}"))),
    }
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}
