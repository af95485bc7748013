//! Client-facing error taxonomy.
//!
//! Every failure that reaches a client is one of a small closed set of
//! categories, each with a fixed HTTP status and a stable label. Handlers and
//! pipeline stages return [`ApiError`]; its `IntoResponse` impl only marks the
//! response, and the terminal error boundary renders the envelope once the
//! request id and operating mode are known.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::request::RequestId;

/// Message shown for `internal` errors in production mode.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Malformed input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing or rejected credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Declared origin not in the allowed set (403).
    #[error("Origin '{origin}' is not allowed by CORS policy")]
    CrossOriginDenied { origin: String },

    /// Handler-declared missing resource (404).
    #[error("{0}")]
    NotFound(String),

    /// Admission ceiling exceeded (429).
    #[error("Too many requests, please try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Admission closed while shutting down (503).
    #[error("Service is shutting down")]
    Unavailable,

    /// Anything unclassified (500).
    #[error("{0}")]
    Internal(String),
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub request_id: &'a str,
}

impl ApiError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::CrossOriginDenied { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-stable label sent as `error`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::CrossOriginDenied { .. } => "cross-origin-denied",
            Self::NotFound(_) => "not-found",
            Self::RateLimited { .. } => "rate-limited",
            Self::Unavailable => "unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// Text shown to the client; internal detail is redacted in production.
    pub fn client_message(&self, production: bool) -> String {
        match self {
            Self::Internal(_) if production => GENERIC_INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Classify a bare error response produced outside handler code
    /// (framework rejections, timeouts, panics).
    pub fn from_status(status: StatusCode, detail: String) -> Self {
        let detail = if detail.trim().is_empty() {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        } else {
            detail
        };
        match status.as_u16() {
            400 | 411 | 413 | 415 | 422 => Self::Validation(detail),
            401 | 403 => Self::Unauthorized(detail),
            404 | 405 => Self::NotFound(detail),
            429 => Self::RateLimited { retry_after_secs: 0 },
            503 => Self::Unavailable,
            _ => Self::Internal(detail),
        }
    }

    /// Render the final envelope for this error.
    pub fn render(&self, request_id: &RequestId, production: bool) -> Response {
        let text = self.client_message(production);
        let (message, details) = match self {
            Self::Validation(_) => (None, Some(text)),
            _ => (Some(text), None),
        };
        let body = ErrorBody {
            error: self.label(),
            message,
            details,
            request_id: request_id.as_str(),
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_label_are_fixed() {
        let cases = [
            (ApiError::Validation("x".into()), 400, "validation"),
            (ApiError::Unauthorized("x".into()), 401, "unauthorized"),
            (
                ApiError::CrossOriginDenied { origin: "https://evil.test".into() },
                403,
                "cross-origin-denied",
            ),
            (ApiError::NotFound("x".into()), 404, "not-found"),
            (ApiError::RateLimited { retry_after_secs: 5 }, 429, "rate-limited"),
            (ApiError::Unavailable, 503, "unavailable"),
            (ApiError::Internal("x".into()), 500, "internal"),
        ];
        for (err, status, label) in cases {
            assert_eq!(err.status().as_u16(), status);
            assert_eq!(err.label(), label);
        }
    }

    #[test]
    fn test_internal_detail_redacted_in_production() {
        let err = ApiError::internal("connection reset by peer");
        assert_eq!(err.client_message(false), "connection reset by peer");
        assert_eq!(err.client_message(true), GENERIC_INTERNAL_MESSAGE);

        let not_found = ApiError::NotFound("No product 42".into());
        assert_eq!(not_found.client_message(true), "No product 42");
    }

    #[test]
    fn test_into_response_marks_error() {
        let response = ApiError::NotFound("gone".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<ApiError>(),
            Some(&ApiError::NotFound("gone".into()))
        );
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad json".into()).label(),
            "validation"
        );
        assert_eq!(
            ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED, String::new()),
            ApiError::NotFound("Method Not Allowed".into())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::REQUEST_TIMEOUT, String::new()).label(),
            "internal"
        );
    }

    #[test]
    fn test_rate_limited_render_sets_retry_after() {
        let id = RequestId::new();
        let response = ApiError::RateLimited { retry_after_secs: 42 }.render(&id, true);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
