/// Error types for gh-proxy-service
///
/// Pipeline errors map onto the fixed client-facing status codes; upstream
/// and credential failures render as 502 so callers can distinguish proxy
/// trouble from real upstream answers (which are passed through verbatim).
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for gh-proxy-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// No `X-API-Key` header (or an empty one) on the request
    #[error("missing API key")]
    MissingApiKey,

    /// The presented API key is unknown or disabled
    #[error("API key rejected")]
    KeyRejected,

    /// Incoming request body exceeds the configured cap
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// The per-key token bucket is empty
    #[error("rate limit exceeded")]
    RateLimited,

    /// No non-revoked donated credentials are available
    #[error("no donated credentials available")]
    NoCredentials,

    /// The upstream call failed at the transport level (connect, timeout)
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey => StatusCode::UNAUTHORIZED,
            AppError::KeyRejected => StatusCode::FORBIDDEN,
            AppError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NoCredentials | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MissingApiKey.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::KeyRejected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::BodyTooLarge(1024).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::NoCredentials.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Upstream("connect refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_body_too_large_message_names_the_cap() {
        let err = AppError::BodyTooLarge(1_048_576);
        assert!(err.to_string().contains("1048576"));
    }
}
