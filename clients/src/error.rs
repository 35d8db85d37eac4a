//! Error types for the external service clients

use thiserror::Error;

/// Errors that can occur when calling an external service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Service answered with a non-success HTTP status
    #[error("HTTP error (status {status}): {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Service answered with `result = false` or a non-zero `code`
    #[error("API error (code {code}): {message}")]
    Api {
        /// Business error code
        code: i64,
        /// Error message from the service
        message: String,
    },

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// A password returned by the service was not valid base64 UTF-8
    #[error("Invalid password encoding: {0}")]
    InvalidPassword(String),

    /// The service does not know the requested entry
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Whether the call may succeed if repeated.
    ///
    /// Transport failures, rate limiting and 5xx are transient; everything the
    /// service answered deliberately is not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result alias for client calls.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ApiError::RequestFailed("reset".into()).is_retryable());
        assert!(ApiError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(ApiError::Http { status: 429, body: String::new() }.is_retryable());
    }

    #[test]
    fn deliberate_errors_are_not_retryable() {
        assert!(!ApiError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!ApiError::Api { code: 1, message: "bad".into() }.is_retryable());
        assert!(!ApiError::ResponseParseFailed("eof".into()).is_retryable());
    }
}
