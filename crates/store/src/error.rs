//! Error types for the store client

use sos_core::ErrorCode;
use thiserror::Error;

/// Result type alias for store operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Store client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database returned an error response
    #[error("Database error ({status}): {message}")]
    ApiResponse {
        /// HTTP status code
        status: u16,
        /// Error message from the database
        message: String,
    },

    /// A path segment the database would reject
    #[error("Invalid path segment `{segment}`: {reason}")]
    InvalidPath {
        /// Offending segment
        segment: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Injected failure from the in-memory store
    #[error("Simulated store failure: {0}")]
    Simulated(String),
}

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an API response error
    pub fn api_response(status: u16, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            status,
            message: message.into(),
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if (400..500).contains(status))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if *status >= 500)
    }

    /// The workspace error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Request(e) if e.is_connect() || e.is_timeout() => ErrorCode::StoreUnreachable,
            Self::Request(_) | Self::Simulated(_) => ErrorCode::StoreError,
            Self::ApiResponse { .. } => ErrorCode::StoreRejected,
            Self::Json(_) => ErrorCode::InvalidFormat,
            Self::Config(_) => ErrorCode::ConfigValidationError,
            Self::InvalidPath { .. } => ErrorCode::InvalidInput,
        }
    }
}

impl From<ApiError> for sos_core::Error {
    fn from(err: ApiError) -> Self {
        let code = err.code();
        let error = sos_core::Error::new(code, err.to_string());
        match code {
            ErrorCode::StoreUnreachable => {
                error.with_suggestion("Check network connectivity and store.database_url")
            }
            ErrorCode::StoreRejected if err.is_client_error() => {
                error.with_suggestion("Check the database rules and store.auth_token")
            }
            _ => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let forbidden = ApiError::api_response(401, "Permission denied");
        assert!(forbidden.is_client_error());
        assert!(!forbidden.is_server_error());

        let unavailable = ApiError::api_response(503, "Service Unavailable");
        assert!(unavailable.is_server_error());
    }

    #[test]
    fn test_core_conversion_keeps_code() {
        let err: sos_core::Error = ApiError::api_response(401, "Permission denied").into();
        assert_eq!(err.code, ErrorCode::StoreRejected);
        assert!(err.suggestion.unwrap().contains("auth_token"));

        let err: sos_core::Error = ApiError::InvalidPath {
            segment: "a.b".to_string(),
            reason: "contains a forbidden character",
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
