//! Dispatch error taxonomy and the client-facing error envelope.
//!
//! Backend 4xx/5xx responses are relayed, not wrapped: these errors only
//! cover the cases where no backend response can be relayed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Why a request could not be dispatched.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Zero eligible instances for the target service.
    #[error("no healthy instance available for service '{service}'")]
    NoHealthyInstance { service: String },

    /// The service's circuit breaker is open; no network attempt was made.
    #[error("service '{service}' is temporarily unavailable (circuit open)")]
    CircuitOpen { service: String },

    /// The request deadline elapsed awaiting the backend.
    #[error("timed out awaiting service '{service}'")]
    UpstreamTimeout { service: String },

    /// Connection refused/reset or DNS failure.
    #[error("service '{service}' unreachable: {reason}")]
    UpstreamUnreachable { service: String, reason: String },

    /// No route matched the inbound path/method.
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// Unexpected internal failure; details stay in the logs.
    #[error("internal dispatch error")]
    Internal,
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NoHealthyInstance { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::UpstreamUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NoHealthyInstance { .. } => "NO_HEALTHY_INSTANCE",
            DispatchError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            DispatchError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            DispatchError::UpstreamUnreachable { .. } => "UPSTREAM_UNREACHABLE",
            DispatchError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            DispatchError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
