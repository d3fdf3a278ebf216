//! The location provider seam

use crate::error::Result;
use crate::event::EventSender;
use serde::{Deserialize, Serialize};
use sos_geo::LocationFix;
use std::time::Duration;

/// Name of the highest-precision provider
pub const GPS_PROVIDER: &str = "gps";

/// Parameters of a location registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Provider to register with
    pub provider: String,
    /// Minimum interval between fixes
    pub min_time: Duration,
    /// Minimum movement between fixes, in meters
    pub min_distance_m: f64,
}

impl LocationRequest {
    /// The request the SOS button arms: GPS, deliver the next fix immediately
    #[must_use]
    pub fn next_gps_fix() -> Self {
        Self {
            provider: GPS_PROVIDER.to_string(),
            min_time: Duration::ZERO,
            min_distance_m: 0.0,
        }
    }
}

/// Provider availability as reported by status callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Delivering fixes
    Available,
    /// Expected back shortly
    TemporarilyUnavailable,
    /// Not expected back without user action
    OutOfService,
}

/// Callbacks a registered provider delivers
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A new fix
    Fix(LocationFix),
    /// The named provider was switched on
    ProviderEnabled(String),
    /// The named provider was switched off or cannot be reached
    ProviderDisabled(String),
    /// The provider gave up on the registration and will deliver nothing more
    RegistrationEnded(String),
    /// The provider's availability changed
    StatusChanged {
        /// Provider name
        provider: String,
        /// New status
        status: ProviderStatus,
    },
}

/// A platform location service.
///
/// After `request_updates` the provider posts [`LocationEvent`]s through the
/// sender until `remove_updates` is called. `ProviderDisabled` leaves the
/// registration in place; a provider that stops on its own posts
/// `RegistrationEnded` last. `remove_updates` drops every registration and
/// must be safe to call when nothing is registered.
pub trait LocationProvider: Send {
    /// Start delivering events for `request`
    fn request_updates(&mut self, request: &LocationRequest, events: EventSender) -> Result<()>;

    /// Stop delivering events
    fn remove_updates(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_gps_fix_has_no_filters() {
        let request = LocationRequest::next_gps_fix();
        assert_eq!(request.provider, "gps");
        assert_eq!(request.min_time, Duration::ZERO);
        assert_eq!(request.min_distance_m, 0.0);
    }
}
