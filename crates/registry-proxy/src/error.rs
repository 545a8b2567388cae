//! Error types for the registry proxy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Startup and infrastructure errors
#[derive(Debug)]
pub enum ProxyError {
    Io(Box<std::io::Error>),
    Config(String),
    RateLimitStore(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProxyError::RateLimitStore(msg) => write!(f, "Rate limit store error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Handler error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    TooManyRequests { retry_after_secs: u64 },
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, axum::Json(json!({ "error": msg }))).into_response()
            }
            AppError::TooManyRequests { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after_secs.to_string())],
                axum::Json(json!({ "error": "too many requests" })),
            )
                .into_response(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({ "error": "failed to fetch file" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ProxyError::Config("invalid GITHUB_API_URL".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: invalid GITHUB_API_URL"
        );
    }

    #[test]
    fn test_rate_limit_store_error_display() {
        let err = ProxyError::RateLimitStore("connection refused".to_string());
        assert!(format!("{}", err).contains("connection refused"));
    }

    #[test]
    fn test_url_parse_error_is_config() {
        let err = ProxyError::from(url::Url::parse("not a url").unwrap_err());
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn test_not_found_response() {
        let response = AppError::NotFound("file not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_too_many_requests_response() {
        let response = AppError::TooManyRequests {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }

    #[test]
    fn test_internal_response_hides_details() {
        let response = AppError::Internal("dns failure".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
