//! Coordinates and location fixes for the SOS beacon.
//!
//! This crate provides:
//! - [`Coordinate`], a validated latitude/longitude pair
//! - [`LocationFix`], a single reading from a location provider
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use sos_geo::{Coordinate, LocationFix};
//!
//! let fix = LocationFix::new(Coordinate::new(12.34, 56.78), Utc::now()).unwrap();
//! assert_eq!(fix.latitude(), 12.34);
//! ```

mod error;
mod fix;

pub use error::{GeoError, GeoErrorCode, Result};
pub use fix::LocationFix;

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    ///
    /// # Arguments
    /// * `latitude` - Latitude in degrees (-90 to 90)
    /// * `longitude` - Longitude in degrees (-180 to 180)
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true if the coordinate has valid values.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Checks both components, reporting the first one out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_coordinate_creation() {
        let coord = Coordinate::new(12.34, 56.78);
        assert_eq!(coord.latitude, 12.34);
        assert_eq!(coord.longitude, 56.78);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_validate_reports_component() {
        assert_eq!(
            Coordinate::new(95.0, 0.0).validate(),
            Err(GeoError::InvalidLatitude(95.0))
        );
        assert_eq!(
            Coordinate::new(0.0, -200.0).validate().unwrap_err().code(),
            GeoErrorCode::InvalidLongitude
        );
    }

    #[test]
    fn test_coordinate_from_tuple() {
        let coord: Coordinate = (12.34, 56.78).into();
        assert_eq!(coord.latitude, 12.34);
    }

    proptest! {
        #[test]
        fn in_range_coordinates_are_valid(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
            prop_assert!(Coordinate::new(lat, lng).is_valid());
        }

        #[test]
        fn out_of_range_latitude_is_rejected(lat in 90.0001f64..1e6, lng in -180.0f64..=180.0) {
            prop_assert!(!Coordinate::new(lat, lng).is_valid());
            prop_assert!(!Coordinate::new(-lat, lng).is_valid());
        }
    }
}
