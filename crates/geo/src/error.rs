//! Error types for the geo crate.

use thiserror::Error;

/// Result type alias for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur during geo operations.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    /// Latitude outside -90..=90 or not finite
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180 or not finite
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),
}

/// Error code for integration with sos-core error handling.
/// Range: 5xxx, the location block.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoErrorCode {
    /// Invalid latitude
    InvalidLatitude = 5101,
    /// Invalid longitude
    InvalidLongitude = 5102,
}

impl GeoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> GeoErrorCode {
        match self {
            GeoError::InvalidLatitude(_) => GeoErrorCode::InvalidLatitude,
            GeoError::InvalidLongitude(_) => GeoErrorCode::InvalidLongitude,
        }
    }
}
