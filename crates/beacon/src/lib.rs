//! Permission-gated location reporting for the SOS beacon
//!
//! One screen with one button. Pressing it checks the location permission,
//! requests it when missing, then asks the location provider for a single
//! fix and writes the coordinates and a timestamp to the device record in the
//! remote store. Independently, once the phone-state permission is granted,
//! the platform build identifier is written and shown on the screen label.
//!
//! Everything runs on one task consuming a channel of [`ScreenEvent`]s:
//! user taps, permission results, and location events. Platform services are
//! injected as traits:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`PermissionPlatform`] | checks and requests runtime permissions |
//! | [`LocationProvider`] | registers/unregisters for location events |
//! | [`DisplaySurface`] | the label and transient messages |
//! | [`DeviceInfo`] | device identifier and build identifier |
//! | [`sos_store::RemoteStore`] | the remote key-value store |
//!
//! # Example
//!
//! ```rust,ignore
//! let (events, receiver) = sos_beacon::channel();
//! let context = SessionContext::new(device_id, store, "users", Box::new(provider))?;
//! let mut screen = Screen::builder(context)
//!     .permissions(Box::new(permissions))
//!     .display(Box::new(display))
//!     .device(Box::new(device))
//!     .build(events.clone())?;
//!
//! screen.start()?;
//! events.post(ScreenEvent::SosPressed);
//! screen.run(receiver, |_| ControlFlow::Continue(())).await;
//! screen.close().await;
//! ```

pub mod clock;
pub mod context;
pub mod device;
pub mod display;
pub mod error;
pub mod event;
pub mod location;
pub mod permission;
pub mod record;
pub mod report;
pub mod screen;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, SystemClock, TimestampFormatter};
pub use context::SessionContext;
pub use device::{DeviceId, DeviceInfo};
pub use display::{DisplaySurface, Strings};
pub use error::{BeaconError, Result};
pub use event::{channel, EventReceiver, EventSender, ScreenEvent};
pub use location::{LocationEvent, LocationProvider, LocationRequest, ProviderStatus, GPS_PROVIDER};
pub use permission::{
    GateDecision, Permission, PermissionGate, PermissionPlatform, PermissionRequestKind,
    PermissionState,
};
pub use record::{DeviceRecordField, RecordWriter};
pub use report::{LocationReport, ReportFlow};
pub use screen::{Screen, ScreenBuilder, ScreenUpdate, SessionSummary};
