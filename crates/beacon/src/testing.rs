//! Scripted platform services for tests
//!
//! Every fake is a cheap handle over shared state: hand one clone to the
//! screen and keep another to drive events and inspect what happened.

use crate::clock::Clock;
use crate::device::{DeviceId, DeviceInfo};
use crate::display::DisplaySurface;
use crate::error::Result;
use crate::event::{EventSender, ScreenEvent};
use crate::location::{LocationEvent, LocationProvider, LocationRequest};
use crate::permission::{Permission, PermissionPlatform, PermissionRequestKind};
use chrono::{DateTime, Utc};
use sos_geo::{Coordinate, LocationFix};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Display that records what it was asked to show
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    label: Arc<Mutex<Option<String>>>,
    toasts: Arc<Mutex<Vec<String>>>,
}

impl RecordingDisplay {
    /// Blank label, no toasts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current label text
    #[must_use]
    pub fn label(&self) -> Option<String> {
        lock(&self.label).clone()
    }

    /// Every toast so far, oldest first
    #[must_use]
    pub fn toasts(&self) -> Vec<String> {
        lock(&self.toasts).clone()
    }
}

impl DisplaySurface for RecordingDisplay {
    fn set_label(&self, text: &str) {
        *lock(&self.label) = Some(text.to_string());
    }

    fn toast(&self, text: &str) {
        lock(&self.toasts).push(text.to_string());
    }
}

/// How [`ScriptedPermissions`] answers requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Never,
    Grant,
    Deny,
}

#[derive(Debug)]
struct PermissionScript {
    held: HashSet<Permission>,
    answer: Answer,
    requests: Vec<(i32, Vec<Permission>)>,
}

/// Permission platform with a fixed set of held permissions and a scripted
/// answer to requests
#[derive(Debug, Clone)]
pub struct ScriptedPermissions {
    inner: Arc<Mutex<PermissionScript>>,
}

impl ScriptedPermissions {
    fn with(held: HashSet<Permission>, answer: Answer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PermissionScript {
                held,
                answer,
                requests: Vec::new(),
            })),
        }
    }

    /// Holds every permission of `kinds`; other requests are never answered
    #[must_use]
    pub fn granting(kinds: &[PermissionRequestKind]) -> Self {
        let held = kinds
            .iter()
            .flat_map(|kind| kind.permissions().iter().copied())
            .collect();
        Self::with(held, Answer::Never)
    }

    /// Holds nothing and never answers
    #[must_use]
    pub fn silent() -> Self {
        Self::with(HashSet::new(), Answer::Never)
    }

    /// Holds nothing and grants every request
    #[must_use]
    pub fn approving() -> Self {
        Self::with(HashSet::new(), Answer::Grant)
    }

    /// Holds nothing and denies every request
    #[must_use]
    pub fn refusing() -> Self {
        Self::with(HashSet::new(), Answer::Deny)
    }

    /// Requests issued so far as `(request_code, permissions)`
    #[must_use]
    pub fn requests(&self) -> Vec<(i32, Vec<Permission>)> {
        lock(&self.inner).requests.clone()
    }
}

impl PermissionPlatform for ScriptedPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        lock(&self.inner).held.contains(&permission)
    }

    fn request(
        &mut self,
        request_code: i32,
        permissions: &[Permission],
        events: &EventSender,
    ) -> Result<()> {
        let mut script = lock(&self.inner);
        script.requests.push((request_code, permissions.to_vec()));

        let grant = match script.answer {
            Answer::Never => return Ok(()),
            Answer::Grant => true,
            Answer::Deny => false,
        };
        if grant {
            script.held.extend(permissions.iter().copied());
        }
        drop(script);

        events.post(ScreenEvent::PermissionResult {
            request_code,
            grants: vec![grant; permissions.len()],
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LocationScript {
    sender: Option<EventSender>,
    requests: Vec<LocationRequest>,
    active: usize,
}

/// Location provider driven by the test
#[derive(Debug, Clone, Default)]
pub struct ScriptedLocation {
    inner: Arc<Mutex<LocationScript>>,
}

impl ScriptedLocation {
    /// Nothing registered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `request_updates` calls
    #[must_use]
    pub fn registrations(&self) -> usize {
        lock(&self.inner).requests.len()
    }

    /// Registrations currently live
    #[must_use]
    pub fn active(&self) -> usize {
        lock(&self.inner).active
    }

    /// Every request received, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<LocationRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Post an event to the registered listener. Returns `false` when
    /// nothing is registered.
    pub fn deliver(&self, event: LocationEvent) -> bool {
        let sender = lock(&self.inner).sender.clone();
        sender.is_some_and(|sender| sender.post(ScreenEvent::Location(event)))
    }

    /// Deliver a fix captured now
    pub fn deliver_fix(&self, latitude: f64, longitude: f64) -> bool {
        self.deliver(LocationEvent::Fix(LocationFix {
            coordinate: Coordinate::new(latitude, longitude),
            captured_at: Utc::now(),
        }))
    }

    /// Report the GPS provider as switched off
    pub fn deliver_provider_disabled(&self) -> bool {
        self.deliver(LocationEvent::ProviderDisabled(crate::GPS_PROVIDER.to_string()))
    }

    /// Give up on the registration: post `RegistrationEnded` and stop
    /// delivering, as a provider that cannot recover does
    pub fn end_registration(&self) -> bool {
        let posted = self.deliver(LocationEvent::RegistrationEnded(crate::GPS_PROVIDER.to_string()));
        let mut script = lock(&self.inner);
        script.sender = None;
        script.active = 0;
        posted
    }
}

impl LocationProvider for ScriptedLocation {
    fn request_updates(&mut self, request: &LocationRequest, events: EventSender) -> Result<()> {
        let mut script = lock(&self.inner);
        script.requests.push(request.clone());
        script.sender = Some(events);
        script.active += 1;
        Ok(())
    }

    fn remove_updates(&mut self) {
        let mut script = lock(&self.inner);
        script.sender = None;
        script.active = 0;
    }
}

/// Clock pinned to an instant the test controls
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Clock reading `at`
    #[must_use]
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at: Arc::new(Mutex::new(at)),
        }
    }

    /// Move the clock
    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.at) = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.at)
    }
}

/// Device with a fixed id and build
#[derive(Debug, Clone)]
pub struct StaticDevice {
    id: String,
    build: String,
}

impl StaticDevice {
    /// Device `id` running `build`
    #[must_use]
    pub fn new(id: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            build: build.into(),
        }
    }
}

impl DeviceInfo for StaticDevice {
    fn device_id(&self) -> sos_core::Result<DeviceId> {
        DeviceId::new(self.id.clone())
    }

    fn build_display(&self) -> sos_core::Result<String> {
        Ok(self.build.clone())
    }
}
