//! The SOS screen
//!
//! Owns the session context, the permission gate and the report flow, and
//! handles [`ScreenEvent`]s one at a time. Every platform callback arrives as
//! an event on the same channel, so handlers never run concurrently.

use crate::clock::{Clock, SystemClock, TimestampFormatter};
use crate::context::SessionContext;
use crate::device::DeviceInfo;
use crate::display::{DisplaySurface, Strings};
use crate::error::{BeaconError, Result};
use crate::event::{EventReceiver, EventSender, ScreenEvent};
use crate::location::LocationEvent;
use crate::permission::{
    GateDecision, PermissionGate, PermissionPlatform, PermissionRequestKind, PermissionState,
};
use crate::report::{LocationReport, ReportFlow};
use serde::Serialize;
use sos_core::config::StringsConfig;
use sos_store::RemoteStore;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What handling one event did
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenUpdate {
    /// Nothing visible changed
    Idle,
    /// A location request was armed
    LocationRequested,
    /// The location permission request is outstanding
    LocationPermissionPending,
    /// A tap arrived while a request was already armed
    AlreadyArmed,
    /// A fix was written
    LocationReported(LocationReport),
    /// The build number was written; carries the label text
    BuildNumberSubmitted(String),
    /// A permission is denied; nothing further happens for it
    PermissionDenied(PermissionRequestKind),
    /// The provider is off; the user was advised
    ProviderDisabled(String),
    /// The provider dropped the armed request; the next trigger re-arms
    LocationRequestEnded(String),
    /// The event did not apply in the current state
    Ignored,
    /// Shutdown was requested
    Closed,
    /// A handler failed; the screen keeps running
    Error(String),
}

/// End-of-session totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Record key
    pub device_id: String,
    /// Fixes written this session
    pub fixes_reported: usize,
    /// The most recent report
    pub last_report: Option<LocationReport>,
    /// Whether `buildNumber` was written
    pub build_number_submitted: bool,
    /// Final state of the location permission
    pub location_permission: PermissionState,
    /// Final state of the phone-state permission
    pub phone_state_permission: PermissionState,
}

/// Assembles a [`Screen`] from its platform services
pub struct ScreenBuilder<S> {
    context: SessionContext<S>,
    permissions: Option<Box<dyn PermissionPlatform>>,
    display: Option<Box<dyn DisplaySurface>>,
    device: Option<Box<dyn DeviceInfo>>,
    strings: StringsConfig,
    formatter: TimestampFormatter,
    clock: Arc<dyn Clock>,
}

impl<S: RemoteStore> ScreenBuilder<S> {
    /// Permission platform
    #[must_use]
    pub fn permissions(mut self, permissions: Box<dyn PermissionPlatform>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Display surface
    #[must_use]
    pub fn display(mut self, display: Box<dyn DisplaySurface>) -> Self {
        self.display = Some(display);
        self
    }

    /// Device information
    #[must_use]
    pub fn device(mut self, device: Box<dyn DeviceInfo>) -> Self {
        self.device = Some(device);
        self
    }

    /// User-visible strings (defaults apply otherwise)
    #[must_use]
    pub fn strings(mut self, strings: StringsConfig) -> Self {
        self.strings = strings;
        self
    }

    /// Timestamp rendering (UTC+05:30 otherwise)
    #[must_use]
    pub fn formatter(mut self, formatter: TimestampFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Clock read when a fix arrives (the system clock otherwise)
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Finish the screen. `events` is handed to platform services that
    /// answer asynchronously.
    pub fn build(self, events: EventSender) -> Result<Screen<S>> {
        let missing = |what: &str| {
            BeaconError::Platform(sos_core::Error::platform(format!("screen has no {what}")))
        };

        let permissions = self.permissions.ok_or_else(|| missing("permission platform"))?;
        let display = self.display.ok_or_else(|| missing("display"))?;
        let device = self.device.ok_or_else(|| missing("device info"))?;
        let strings = Strings::from_config(&self.strings)?;

        Ok(Screen {
            context: self.context,
            gate: PermissionGate::new(),
            flow: ReportFlow::new(strings, self.formatter, self.clock),
            permissions,
            display,
            device,
            events,
            fixes_reported: 0,
            last_report: None,
        })
    }
}

/// One screen session
pub struct Screen<S> {
    context: SessionContext<S>,
    gate: PermissionGate,
    flow: ReportFlow,
    permissions: Box<dyn PermissionPlatform>,
    display: Box<dyn DisplaySurface>,
    device: Box<dyn DeviceInfo>,
    events: EventSender,
    fixes_reported: usize,
    last_report: Option<LocationReport>,
}

impl<S: RemoteStore> Screen<S> {
    /// Start assembling a screen around `context`
    pub fn builder(context: SessionContext<S>) -> ScreenBuilder<S> {
        ScreenBuilder {
            context,
            permissions: None,
            display: None,
            device: None,
            strings: StringsConfig::default(),
            formatter: TimestampFormatter::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Screen creation: check phone state, submitting the build number when
    /// it is already granted.
    pub fn start(&mut self) -> Result<ScreenUpdate> {
        info!(device_id = %self.context.device_id(), "Screen started");
        let decision = self.gate.ensure(
            PermissionRequestKind::PhoneState,
            self.permissions.as_mut(),
            &self.events,
        )?;

        match decision {
            GateDecision::Proceed => self.submit_build_number(),
            GateDecision::Requested | GateDecision::Pending => Ok(ScreenUpdate::Idle),
            GateDecision::Denied => Ok(ScreenUpdate::PermissionDenied(
                PermissionRequestKind::PhoneState,
            )),
        }
    }

    /// Handle one event. Must be called inside a tokio runtime; record
    /// writes are spawned onto it.
    pub fn dispatch(&mut self, event: ScreenEvent) -> Result<ScreenUpdate> {
        debug!(?event, "Dispatching screen event");
        match event {
            ScreenEvent::SosPressed => self.on_sos_pressed(),
            ScreenEvent::PermissionResult {
                request_code,
                grants,
            } => self.on_permission_result(request_code, &grants),
            ScreenEvent::Location(event) => self.on_location_event(event),
            ScreenEvent::Shutdown => Ok(ScreenUpdate::Closed),
        }
    }

    /// Consume events until shutdown, the channel closing, or `observer`
    /// breaking. Handler errors are reported to the observer as
    /// [`ScreenUpdate::Error`] and do not stop the loop.
    pub async fn run<F>(&mut self, mut events: EventReceiver, mut observer: F)
    where
        F: FnMut(&ScreenUpdate) -> ControlFlow<()>,
    {
        while let Some(event) = events.next().await {
            let update = self.dispatch(event).unwrap_or_else(|e| {
                warn!(error = %e, code = %e.code(), "Screen event failed");
                ScreenUpdate::Error(e.to_string())
            });

            let closed = update == ScreenUpdate::Closed;
            if observer(&update).is_break() || closed {
                break;
            }
        }
    }

    /// Wait for queued record writes
    pub async fn flush(&mut self) {
        self.context.writer.drain().await;
    }

    /// Tear the session down: drop location registrations and wait for
    /// queued writes.
    pub async fn close(mut self) -> SessionSummary {
        self.flow.disarm(&mut self.context);
        self.flush().await;

        let summary = self.summary();
        info!(
            device_id = %summary.device_id,
            fixes_reported = summary.fixes_reported,
            "Screen closed"
        );
        summary
    }

    /// Totals so far
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            device_id: self.context.device_id().to_string(),
            fixes_reported: self.fixes_reported,
            last_report: self.last_report.clone(),
            build_number_submitted: self.flow.build_number_submitted(),
            location_permission: self.gate.state(PermissionRequestKind::LocationAccess),
            phone_state_permission: self.gate.state(PermissionRequestKind::PhoneState),
        }
    }

    /// Whether a location request is outstanding
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.flow.is_armed()
    }

    /// Current state of a permission kind
    #[must_use]
    pub fn permission_state(&self, kind: PermissionRequestKind) -> PermissionState {
        self.gate.state(kind)
    }

    fn on_sos_pressed(&mut self) -> Result<ScreenUpdate> {
        let decision = self.gate.ensure(
            PermissionRequestKind::LocationAccess,
            self.permissions.as_mut(),
            &self.events,
        )?;

        match decision {
            GateDecision::Proceed => self.arm(),
            GateDecision::Requested | GateDecision::Pending => {
                Ok(ScreenUpdate::LocationPermissionPending)
            }
            GateDecision::Denied => Ok(ScreenUpdate::PermissionDenied(
                PermissionRequestKind::LocationAccess,
            )),
        }
    }

    fn on_permission_result(&mut self, request_code: i32, grants: &[bool]) -> Result<ScreenUpdate> {
        let Some(kind) = PermissionRequestKind::from_request_code(request_code) else {
            warn!(request_code, "Permission result for unknown request code");
            return Ok(ScreenUpdate::Ignored);
        };

        match (kind, self.gate.on_result(kind, grants)) {
            (PermissionRequestKind::LocationAccess, Some(PermissionState::Granted)) => self.arm(),
            (PermissionRequestKind::PhoneState, Some(PermissionState::Granted)) => {
                self.submit_build_number()
            }
            (kind, Some(PermissionState::Denied)) => Ok(ScreenUpdate::PermissionDenied(kind)),
            _ => Ok(ScreenUpdate::Ignored),
        }
    }

    fn on_location_event(&mut self, event: LocationEvent) -> Result<ScreenUpdate> {
        match event {
            LocationEvent::Fix(fix) => {
                let report =
                    self.flow
                        .on_location_acquired(&mut self.context, self.display.as_ref(), &fix)?;
                Ok(match report {
                    Some(report) => {
                        self.fixes_reported += 1;
                        self.last_report = Some(report.clone());
                        ScreenUpdate::LocationReported(report)
                    }
                    None => ScreenUpdate::Ignored,
                })
            }
            LocationEvent::ProviderDisabled(provider) => {
                if self.flow.on_provider_disabled(self.display.as_ref(), &provider) {
                    Ok(ScreenUpdate::ProviderDisabled(provider))
                } else {
                    Ok(ScreenUpdate::Ignored)
                }
            }
            LocationEvent::RegistrationEnded(provider) => {
                if self.flow.on_registration_ended(&mut self.context, &provider) {
                    Ok(ScreenUpdate::LocationRequestEnded(provider))
                } else {
                    Ok(ScreenUpdate::Ignored)
                }
            }
            LocationEvent::ProviderEnabled(provider) => {
                debug!(%provider, "Location provider enabled");
                Ok(ScreenUpdate::Ignored)
            }
            LocationEvent::StatusChanged { provider, status } => {
                debug!(%provider, ?status, "Location provider status changed");
                Ok(ScreenUpdate::Ignored)
            }
        }
    }

    fn arm(&mut self) -> Result<ScreenUpdate> {
        if self.flow.arm(&mut self.context, &self.events)? {
            Ok(ScreenUpdate::LocationRequested)
        } else {
            Ok(ScreenUpdate::AlreadyArmed)
        }
    }

    fn submit_build_number(&mut self) -> Result<ScreenUpdate> {
        let label = self.flow.submit_build_number(
            &mut self.context,
            self.display.as_ref(),
            self.device.as_ref(),
        )?;
        Ok(label.map_or(ScreenUpdate::Ignored, ScreenUpdate::BuildNumberSubmitted))
    }
}

impl<S> std::fmt::Debug for Screen<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("context", &self.context)
            .field("gate", &self.gate)
            .field("flow", &self.flow)
            .field("fixes_reported", &self.fixes_reported)
            .finish_non_exhaustive()
    }
}
