//! Terminal error boundary.
//!
//! # Responsibilities
//! - Catch every failure surfaced by pipeline stages or handlers, once
//! - Classify bare framework errors (rejections, timeouts, panics)
//! - Log one structured record per handled error
//! - Render the JSON envelope with the request ID
//!
//! # Design Decisions
//! - Outermost layer, so origin rejections raised before context assignment
//!   are rendered too; those get an ID minted here
//! - Headers set by inner layers (security, CORS, request ID) are preserved

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::http::server::AppState;
use crate::security::headers;

/// Upper bound when reading the body of a bare error response.
const BARE_ERROR_BODY_LIMIT: usize = 16 * 1024;

pub async fn error_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let error = match parts.extensions.remove::<ApiError>() {
        Some(error) => error,
        None if is_bare_error(&parts) => {
            // An encoded body is not readable text; fall back to the reason phrase.
            let detail = if parts.headers.contains_key(header::CONTENT_ENCODING) {
                String::new()
            } else {
                match axum::body::to_bytes(body, BARE_ERROR_BODY_LIMIT).await {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(_) => String::new(),
                }
            };
            ApiError::from_status(parts.status, detail)
        }
        None => return Response::from_parts(parts, body),
    };

    let request_id = parts
        .extensions
        .remove::<RequestId>()
        .unwrap_or_default();

    if error.status().is_server_error() {
        tracing::error!(
            target: "food_gateway::errors",
            request_id = %request_id,
            error = %error,
            label = error.label(),
            location = %format_args!("{} {}", method, path),
            "request failed"
        );
    } else {
        tracing::warn!(
            target: "food_gateway::errors",
            request_id = %request_id,
            error = %error,
            label = error.label(),
            location = %format_args!("{} {}", method, path),
            "request rejected"
        );
    }

    let production = state.config.is_production();
    let mut rendered = error.render(&request_id, production);
    for (name, value) in parts.headers.iter() {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH || name == header::CONTENT_ENCODING {
            continue;
        }
        if !rendered.headers().contains_key(name) {
            rendered.headers_mut().insert(name.clone(), value.clone());
        }
    }
    headers::apply(rendered.headers_mut(), production);
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        rendered.headers_mut().insert(X_REQUEST_ID, value);
    }
    rendered.extensions_mut().insert(request_id);
    rendered
}

/// An error status whose body is not already a JSON envelope.
fn is_bare_error(parts: &axum::http::response::Parts) -> bool {
    let is_error = parts.status.is_client_error() || parts.status.is_server_error();
    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    is_error && !is_json
}
