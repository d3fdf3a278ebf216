//! Single location readings.

use crate::{Coordinate, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading from a location provider.
///
/// Produced by a single location event and consumed immediately by the report flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Where the device was
    pub coordinate: Coordinate,
    /// When the provider took the reading
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    /// Creates a fix, rejecting coordinates out of range.
    pub fn new(coordinate: Coordinate, captured_at: DateTime<Utc>) -> Result<Self> {
        coordinate.validate()?;
        Ok(Self {
            coordinate,
            captured_at,
        })
    }

    /// Latitude in degrees
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }

    /// Longitude in degrees
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoError;
    use chrono::TimeZone;

    #[test]
    fn test_fix_accessors() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let fix = LocationFix::new(Coordinate::new(12.34, 56.78), at).unwrap();

        assert_eq!(fix.latitude(), 12.34);
        assert_eq!(fix.longitude(), 56.78);
        assert_eq!(fix.captured_at, at);
    }

    #[test]
    fn test_fix_rejects_invalid_coordinate() {
        let err = LocationFix::new(Coordinate::new(0.0, 190.0), Utc::now()).unwrap_err();
        assert_eq!(err, GeoError::InvalidLongitude(190.0));
    }

    #[test]
    fn test_fix_serializes_as_snake_case() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let fix = LocationFix::new(Coordinate::new(1.0, 2.0), at).unwrap();
        let json = serde_json::to_value(fix).unwrap();

        assert_eq!(json["coordinate"]["latitude"], 1.0);
        assert!(json["captured_at"].as_str().unwrap().starts_with("2024-03-01T10:00:00"));
    }
}
