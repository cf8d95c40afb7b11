//! Error types for the server.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the service from starting or shutting down cleanly.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The UDP socket could not be bound.
    #[error("failed to bind UDP socket on {0}: {1}")]
    UdpBind(SocketAddr, std::io::Error),

    /// The HTTP listener could not be bound.
    #[error("failed to bind HTTP listener on {0}: {1}")]
    HttpBind(SocketAddr, std::io::Error),

    /// The HTTP server stopped with an error.
    #[error("http server error: {0}")]
    Serve(std::io::Error),

    /// The intake engine failed.
    #[error(transparent)]
    Engine(#[from] udplog_core::LogError),

    /// The notifier failed to start.
    #[error(transparent)]
    Notify(#[from] udplog_notify::NotifyError),
}

/// Errors returned to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters.
    #[error("{0}")]
    InvalidRequest(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        };

        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_invalid_request_error_response() {
        let err = ApiError::InvalidRequest("limit must be between 1 and 5000".to_string());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["error"], "invalid_request");
        assert_eq!(json["message"], "limit must be between 1 and 5000");
    }

    #[test]
    fn test_api_error_is_json() {
        let response = ApiError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_bind_error_display() {
        let addr = SocketAddr::from(([0, 0, 0, 0], 5140));
        let err = ServerError::UdpBind(addr, std::io::Error::from(std::io::ErrorKind::AddrInUse));
        assert!(err.to_string().starts_with("failed to bind UDP socket on 0.0.0.0:5140"));
    }
}
