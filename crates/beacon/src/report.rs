//! The location report flow
//!
//! Arms a single location request, turns the first fix into three record
//! writes and a confirmation, then disarms. Also owns the one-time
//! build-number submission.

use crate::clock::{Clock, TimestampFormatter};
use crate::context::SessionContext;
use crate::device::DeviceInfo;
use crate::display::{DisplaySurface, Strings};
use crate::error::Result;
use crate::event::EventSender;
use crate::location::LocationRequest;
use crate::record::DeviceRecordField;
use serde::Serialize;
use serde_json::json;
use sos_geo::LocationFix;
use sos_store::RemoteStore;
use sos_telemetry::{counters, metrics};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a delivered fix was reported as
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationReport {
    /// The fix as delivered
    pub fix: LocationFix,
    /// The `timestamp` field that was written
    pub timestamp: String,
}

/// Single-shot location reporting and build-number submission
pub struct ReportFlow {
    strings: Strings,
    formatter: TimestampFormatter,
    clock: Arc<dyn Clock>,
    armed: bool,
    build_number_submitted: bool,
}

impl ReportFlow {
    /// A disarmed flow
    pub fn new(strings: Strings, formatter: TimestampFormatter, clock: Arc<dyn Clock>) -> Self {
        Self {
            strings,
            formatter,
            clock,
            armed: false,
            build_number_submitted: false,
        }
    }

    /// Whether a location request is outstanding
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether `buildNumber` has been written this session
    #[must_use]
    pub fn build_number_submitted(&self) -> bool {
        self.build_number_submitted
    }

    /// Register for the next GPS fix. Returns `false` without registering
    /// when a request is already outstanding.
    pub fn arm<S: RemoteStore>(
        &mut self,
        context: &mut SessionContext<S>,
        events: &EventSender,
    ) -> Result<bool> {
        if self.armed {
            debug!("Location request already armed, ignoring");
            return Ok(false);
        }

        let request = LocationRequest::next_gps_fix();
        context.location.request_updates(&request, events.clone())?;
        self.armed = true;
        info!(provider = %request.provider, "Location request armed");
        Ok(true)
    }

    /// Report the first fix of an armed request.
    ///
    /// The timestamp comes from the clock at delivery, not from the fix.
    /// Returns `None` when nothing is armed.
    pub fn on_location_acquired<S: RemoteStore>(
        &mut self,
        context: &mut SessionContext<S>,
        display: &dyn DisplaySurface,
        fix: &LocationFix,
    ) -> Result<Option<LocationReport>> {
        if !self.armed {
            debug!("Fix arrived with no armed request, ignoring");
            return Ok(None);
        }

        fix.coordinate.validate()?;
        let timestamp = self.formatter.format(self.clock.now())?;

        context
            .writer
            .write(DeviceRecordField::Latitude, json!(fix.latitude()))?;
        context
            .writer
            .write(DeviceRecordField::Longitude, json!(fix.longitude()))?;
        context
            .writer
            .write(DeviceRecordField::Timestamp, json!(timestamp))?;

        display.toast(self.strings.location_updated());
        self.disarm(context);

        metrics().increment(counters::FIXES_REPORTED);
        info!(
            device_id = %context.device_id(),
            coordinate = %fix.coordinate,
            %timestamp,
            "Location reported"
        );

        Ok(Some(LocationReport {
            fix: *fix,
            timestamp,
        }))
    }

    /// Advise the user to switch GPS on. The request stays armed and nothing
    /// is written. Returns whether the advisory was shown.
    pub fn on_provider_disabled(&self, display: &dyn DisplaySurface, provider: &str) -> bool {
        if !self.armed {
            debug!(provider, "Provider disabled with no armed request, ignoring");
            return false;
        }

        metrics().increment(counters::PROVIDER_DISABLED);
        warn!(provider, "Location provider disabled");
        display.toast(self.strings.enable_gps());
        true
    }

    /// The provider stopped on its own. Disarms so the next trigger registers
    /// again; returns whether a request was armed.
    pub fn on_registration_ended<S: RemoteStore>(
        &mut self,
        context: &mut SessionContext<S>,
        provider: &str,
    ) -> bool {
        if !self.armed {
            debug!(provider, "Registration ended with no armed request, ignoring");
            return false;
        }

        warn!(provider, "Location provider ended the registration");
        self.disarm(context);
        true
    }

    /// Drop every location registration. Safe to call when nothing is armed.
    pub fn disarm<S: RemoteStore>(&mut self, context: &mut SessionContext<S>) {
        context.location.remove_updates();
        self.armed = false;
    }

    /// Write the build identifier and show it on the label, once per session.
    /// Returns the label on the first call, `None` afterwards.
    pub fn submit_build_number<S: RemoteStore>(
        &mut self,
        context: &mut SessionContext<S>,
        display: &dyn DisplaySurface,
        device: &dyn DeviceInfo,
    ) -> Result<Option<String>> {
        if self.build_number_submitted {
            debug!("Build number already submitted");
            return Ok(None);
        }

        let build = device.build_display()?;
        let label = self.strings.build_number_label(&build)?;

        context
            .writer
            .write(DeviceRecordField::BuildNumber, json!(build))?;
        display.set_label(&label);
        self.build_number_submitted = true;

        info!(device_id = %context.device_id(), build_number = %build, "Build number submitted");
        Ok(Some(label))
    }
}

impl std::fmt::Debug for ReportFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportFlow")
            .field("armed", &self.armed)
            .field("build_number_submitted", &self.build_number_submitted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::event::channel;
    use crate::testing::{FixedClock, RecordingDisplay, ScriptedLocation, StaticDevice};
    use chrono::{TimeZone, Utc};
    use sos_core::config::StringsConfig;
    use sos_geo::Coordinate;
    use sos_store::MemoryStore;

    struct Harness {
        store: MemoryStore,
        location: ScriptedLocation,
        display: RecordingDisplay,
        context: SessionContext<MemoryStore>,
        flow: ReportFlow,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let location = ScriptedLocation::new();
        let context = SessionContext::new(
            DeviceId::new("dev-1").unwrap(),
            store.clone(),
            "users",
            Box::new(location.clone()),
        )
        .unwrap();
        let clock = FixedClock::at(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        let flow = ReportFlow::new(
            Strings::from_config(&StringsConfig::default()).unwrap(),
            TimestampFormatter::ist(),
            Arc::new(clock),
        );
        Harness {
            store,
            location,
            display: RecordingDisplay::new(),
            context,
            flow,
        }
    }

    fn fix(lat: f64, lng: f64) -> LocationFix {
        LocationFix {
            coordinate: Coordinate::new(lat, lng),
            captured_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_arm_is_single_shot() {
        let mut h = harness();
        let (events, _rx) = channel();

        assert!(h.flow.arm(&mut h.context, &events).unwrap());
        assert!(!h.flow.arm(&mut h.context, &events).unwrap());
        assert_eq!(h.location.registrations(), 1);
        assert_eq!(h.location.active(), 1);
    }

    #[tokio::test]
    async fn test_fix_is_written_with_callback_time() {
        let mut h = harness();
        let (events, _rx) = channel();
        h.flow.arm(&mut h.context, &events).unwrap();

        let report = h
            .flow
            .on_location_acquired(&mut h.context, &h.display, &fix(12.34, 56.78))
            .unwrap()
            .unwrap();
        h.context.writer.drain().await;

        assert_eq!(report.timestamp, "2024-03-01 15:30:00");
        assert_eq!(
            h.store.snapshot(),
            json!({"users": {"dev-1": {
                "latitude": 12.34,
                "longitude": 56.78,
                "timestamp": "2024-03-01 15:30:00"
            }}})
        );
        assert_eq!(h.display.toasts(), vec!["Location updated".to_string()]);
        assert!(!h.flow.is_armed());
        assert_eq!(h.location.active(), 0);
    }

    #[tokio::test]
    async fn test_fix_without_arming_is_ignored() {
        let mut h = harness();
        let outcome = h
            .flow
            .on_location_acquired(&mut h.context, &h.display, &fix(1.0, 2.0))
            .unwrap();
        h.context.writer.drain().await;

        assert!(outcome.is_none());
        assert!(h.store.writes().is_empty());
        assert!(h.display.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_fix_keeps_request_armed() {
        let mut h = harness();
        let (events, _rx) = channel();
        h.flow.arm(&mut h.context, &events).unwrap();

        assert!(h
            .flow
            .on_location_acquired(&mut h.context, &h.display, &fix(f64::NAN, 2.0))
            .is_err());
        h.context.writer.drain().await;

        assert!(h.flow.is_armed());
        assert!(h.store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_provider_disabled_advises_without_writing() {
        let mut h = harness();
        let (events, _rx) = channel();
        h.flow.arm(&mut h.context, &events).unwrap();

        assert!(h.flow.on_provider_disabled(&h.display, "gps"));
        h.context.writer.drain().await;

        assert_eq!(
            h.display.toasts(),
            vec!["Please enable GPS and Internet".to_string()]
        );
        assert!(h.store.writes().is_empty());
        assert!(h.flow.is_armed());
    }

    #[tokio::test]
    async fn test_registration_end_disarms_for_the_next_trigger() {
        let mut h = harness();
        let (events, _rx) = channel();
        assert!(!h.flow.on_registration_ended(&mut h.context, "gps"));

        h.flow.arm(&mut h.context, &events).unwrap();
        assert!(h.flow.on_registration_ended(&mut h.context, "gps"));
        assert!(!h.flow.is_armed());
        assert_eq!(h.location.active(), 0);

        assert!(h.flow.arm(&mut h.context, &events).unwrap());
        assert_eq!(h.location.registrations(), 2);
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let mut h = harness();
        h.flow.disarm(&mut h.context);
        h.flow.disarm(&mut h.context);
        assert_eq!(h.location.active(), 0);
        assert!(!h.flow.is_armed());
    }

    #[tokio::test]
    async fn test_build_number_submitted_once() {
        let mut h = harness();
        let device = StaticDevice::new("dev-1", "QP1A.190711.020");

        let label = h
            .flow
            .submit_build_number(&mut h.context, &h.display, &device)
            .unwrap();
        let again = h
            .flow
            .submit_build_number(&mut h.context, &h.display, &device)
            .unwrap();
        h.context.writer.drain().await;

        assert_eq!(label.as_deref(), Some("Build number: QP1A.190711.020"));
        assert!(again.is_none());
        assert_eq!(
            h.store.writes_to("users/dev-1/buildNumber"),
            vec![json!("QP1A.190711.020")]
        );
        assert_eq!(
            h.display.label().as_deref(),
            Some("Build number: QP1A.190711.020")
        );
    }
}
