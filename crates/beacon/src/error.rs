//! Error types for the beacon flow

use sos_core::ErrorCode;
use sos_geo::GeoError;
use sos_store::ApiError;
use thiserror::Error;

/// Result type alias for beacon operations
pub type Result<T> = std::result::Result<T, BeaconError>;

/// Errors raised while running the screen
#[derive(Debug, Error)]
pub enum BeaconError {
    /// A store path could not be built or a store call failed
    #[error("Store error: {0}")]
    Store(#[from] ApiError),

    /// The provider produced coordinates out of range
    #[error("Invalid fix: {0}")]
    InvalidFix(#[from] GeoError),

    /// Registering with the location provider failed
    #[error("Location provider error: {0}")]
    Location(String),

    /// The permission platform could not issue a request
    #[error("Permission request failed: {0}")]
    Permission(String),

    /// A user-visible string template did not render
    #[error("Template error: {0}")]
    Template(String),

    /// Device information could not be read
    #[error(transparent)]
    Platform(#[from] sos_core::Error),
}

impl BeaconError {
    /// The workspace error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store(e) => e.code(),
            Self::InvalidFix(_) => ErrorCode::InvalidInput,
            Self::Location(_) => ErrorCode::LocationError,
            Self::Permission(_) => ErrorCode::PermissionError,
            Self::Template(_) => ErrorCode::ConfigValidationError,
            Self::Platform(e) => e.code,
        }
    }
}

impl From<handlebars::TemplateError> for BeaconError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for BeaconError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            BeaconError::Location("gpsd gone".into()).code(),
            ErrorCode::LocationError
        );
        assert_eq!(
            BeaconError::from(GeoError::InvalidLatitude(100.0)).code(),
            ErrorCode::InvalidInput
        );
        assert_eq!(
            BeaconError::from(sos_core::Error::device_id_unavailable()).code(),
            ErrorCode::DeviceIdUnavailable
        );
    }
}
