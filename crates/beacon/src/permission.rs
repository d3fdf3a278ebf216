//! Runtime permission gate
//!
//! Two independent request kinds, each walking
//! `Unknown -> Requested -> Granted | Denied`. The integer request codes only
//! exist at the platform boundary; everything inside the screen matches on
//! [`PermissionRequestKind`].

use crate::error::Result;
use crate::event::EventSender;
use serde::{Deserialize, Serialize};
use sos_core::config::PermissionGrant;
use sos_telemetry::{counters, metrics};
use std::fmt;
use tracing::{debug, info, warn};

/// A single platform permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    /// Precise location
    FineLocation,
    /// Approximate location
    CoarseLocation,
    /// Read device and build state
    ReadPhoneState,
}

impl Permission {
    /// Stable name used in logs and prompts
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FineLocation => "fine-location",
            Self::CoarseLocation => "coarse-location",
            Self::ReadPhoneState => "read-phone-state",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two permission requests the screen makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionRequestKind {
    /// Fine and coarse location, gates the SOS report
    LocationAccess,
    /// Phone state, gates the build number
    PhoneState,
}

impl PermissionRequestKind {
    /// Both kinds
    pub const ALL: [Self; 2] = [Self::LocationAccess, Self::PhoneState];

    /// Code the platform request is tagged with
    #[must_use]
    pub fn request_code(self) -> i32 {
        match self {
            Self::LocationAccess => 1,
            Self::PhoneState => 2,
        }
    }

    /// Inverse of [`request_code`](Self::request_code)
    #[must_use]
    pub fn from_request_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.request_code() == code)
    }

    /// Permissions requested together for this kind
    #[must_use]
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::LocationAccess => &[Permission::FineLocation, Permission::CoarseLocation],
            Self::PhoneState => &[Permission::ReadPhoneState],
        }
    }

    /// Stable name used in logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocationAccess => "location",
            Self::PhoneState => "phone-state",
        }
    }
}

impl From<PermissionGrant> for PermissionRequestKind {
    fn from(grant: PermissionGrant) -> Self {
        match grant {
            PermissionGrant::Location => Self::LocationAccess,
            PermissionGrant::PhoneState => Self::PhoneState,
        }
    }
}

impl fmt::Display for PermissionRequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where one request kind stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Never checked
    #[default]
    Unknown,
    /// Request issued, waiting for the result
    Requested,
    /// Every permission of the kind is held
    Granted,
    /// The user refused; never asked again
    Denied,
}

impl PermissionState {
    /// Granted and Denied end the request cycle
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Granted | Self::Denied)
    }
}

/// Platform runtime-permission service
pub trait PermissionPlatform: Send {
    /// Whether the permission is currently held
    fn is_granted(&self, permission: Permission) -> bool;

    /// Ask for `permissions` without blocking. The answer is posted later as
    /// [`ScreenEvent::PermissionResult`](crate::ScreenEvent::PermissionResult)
    /// carrying `request_code` and one decision per permission.
    fn request(
        &mut self,
        request_code: i32,
        permissions: &[Permission],
        events: &EventSender,
    ) -> Result<()>;
}

/// What `ensure` decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Already granted, run the gated action now
    Proceed,
    /// A request was issued, the action waits for the result
    Requested,
    /// A request is already outstanding
    Pending,
    /// Denied earlier, nothing happens
    Denied,
}

/// Per-kind permission state machine
#[derive(Debug, Default)]
pub struct PermissionGate {
    location: PermissionState,
    phone_state: PermissionState,
}

impl PermissionGate {
    /// Both kinds Unknown
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a kind
    #[must_use]
    pub fn state(&self, kind: PermissionRequestKind) -> PermissionState {
        match kind {
            PermissionRequestKind::LocationAccess => self.location,
            PermissionRequestKind::PhoneState => self.phone_state,
        }
    }

    fn state_mut(&mut self, kind: PermissionRequestKind) -> &mut PermissionState {
        match kind {
            PermissionRequestKind::LocationAccess => &mut self.location,
            PermissionRequestKind::PhoneState => &mut self.phone_state,
        }
    }

    /// Check `kind` and request it when missing.
    pub fn ensure(
        &mut self,
        kind: PermissionRequestKind,
        platform: &mut dyn PermissionPlatform,
        events: &EventSender,
    ) -> Result<GateDecision> {
        let permissions = kind.permissions();

        if permissions.iter().all(|p| platform.is_granted(*p)) {
            *self.state_mut(kind) = PermissionState::Granted;
            debug!(kind = %kind, "Permission already granted");
            return Ok(GateDecision::Proceed);
        }

        match self.state(kind) {
            PermissionState::Denied => {
                debug!(kind = %kind, "Permission denied earlier, not asking again");
                Ok(GateDecision::Denied)
            }
            PermissionState::Requested => {
                debug!(kind = %kind, "Permission request already outstanding");
                Ok(GateDecision::Pending)
            }
            PermissionState::Unknown | PermissionState::Granted => {
                platform.request(kind.request_code(), permissions, events)?;
                *self.state_mut(kind) = PermissionState::Requested;
                info!(kind = %kind, request_code = kind.request_code(), "Permission requested");
                Ok(GateDecision::Requested)
            }
        }
    }

    /// Apply a platform answer. Returns the new state, or `None` when no
    /// request of that kind was outstanding.
    pub fn on_result(
        &mut self,
        kind: PermissionRequestKind,
        grants: &[bool],
    ) -> Option<PermissionState> {
        if self.state(kind) != PermissionState::Requested {
            warn!(kind = %kind, state = ?self.state(kind), "Ignoring unexpected permission result");
            return None;
        }

        let granted = !grants.is_empty() && grants.iter().all(|g| *g);
        let next = if granted {
            metrics().increment(counters::PERMISSIONS_GRANTED);
            PermissionState::Granted
        } else {
            metrics().increment(counters::PERMISSIONS_DENIED);
            PermissionState::Denied
        };

        *self.state_mut(kind) = next;
        info!(kind = %kind, state = ?next, "Permission result");
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel;
    use crate::testing::ScriptedPermissions;

    #[test]
    fn test_request_codes() {
        assert_eq!(PermissionRequestKind::LocationAccess.request_code(), 1);
        assert_eq!(PermissionRequestKind::PhoneState.request_code(), 2);
        assert_eq!(
            PermissionRequestKind::from_request_code(2),
            Some(PermissionRequestKind::PhoneState)
        );
        assert_eq!(PermissionRequestKind::from_request_code(7), None);
    }

    #[test]
    fn test_location_access_covers_fine_and_coarse() {
        assert_eq!(
            PermissionRequestKind::LocationAccess.permissions(),
            [Permission::FineLocation, Permission::CoarseLocation]
        );
    }

    #[test]
    fn test_granted_platform_proceeds_synchronously() {
        let (events, mut rx) = channel();
        let mut platform = ScriptedPermissions::granting(&[PermissionRequestKind::PhoneState]);
        let mut gate = PermissionGate::new();

        let decision = gate
            .ensure(PermissionRequestKind::PhoneState, &mut platform, &events)
            .unwrap();

        assert_eq!(decision, GateDecision::Proceed);
        assert_eq!(gate.state(PermissionRequestKind::PhoneState), PermissionState::Granted);
        assert!(platform.requests().is_empty());
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_check_miss_requests_once() {
        let (events, _rx) = channel();
        let mut platform = ScriptedPermissions::silent();
        let mut gate = PermissionGate::new();
        let kind = PermissionRequestKind::LocationAccess;

        assert_eq!(gate.ensure(kind, &mut platform, &events).unwrap(), GateDecision::Requested);
        assert_eq!(gate.state(kind), PermissionState::Requested);
        assert_eq!(gate.ensure(kind, &mut platform, &events).unwrap(), GateDecision::Pending);

        let requests = platform.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, 1);
    }

    #[test]
    fn test_result_transitions() {
        let (events, _rx) = channel();
        let mut platform = ScriptedPermissions::silent();
        let mut gate = PermissionGate::new();

        gate.ensure(PermissionRequestKind::LocationAccess, &mut platform, &events).unwrap();
        gate.ensure(PermissionRequestKind::PhoneState, &mut platform, &events).unwrap();

        assert_eq!(
            gate.on_result(PermissionRequestKind::LocationAccess, &[true, false]),
            Some(PermissionState::Denied)
        );
        assert_eq!(
            gate.on_result(PermissionRequestKind::PhoneState, &[true]),
            Some(PermissionState::Granted)
        );
    }

    #[test]
    fn test_empty_result_is_denial() {
        let (events, _rx) = channel();
        let mut platform = ScriptedPermissions::silent();
        let mut gate = PermissionGate::new();

        gate.ensure(PermissionRequestKind::PhoneState, &mut platform, &events).unwrap();
        assert_eq!(
            gate.on_result(PermissionRequestKind::PhoneState, &[]),
            Some(PermissionState::Denied)
        );
    }

    #[test]
    fn test_result_without_request_is_ignored() {
        let mut gate = PermissionGate::new();
        assert_eq!(gate.on_result(PermissionRequestKind::PhoneState, &[true]), None);
        assert_eq!(gate.state(PermissionRequestKind::PhoneState), PermissionState::Unknown);
    }

    #[test]
    fn test_denied_is_terminal() {
        let (events, _rx) = channel();
        let mut platform = ScriptedPermissions::silent();
        let mut gate = PermissionGate::new();
        let kind = PermissionRequestKind::LocationAccess;

        gate.ensure(kind, &mut platform, &events).unwrap();
        gate.on_result(kind, &[false, false]);

        assert_eq!(gate.ensure(kind, &mut platform, &events).unwrap(), GateDecision::Denied);
        assert_eq!(platform.requests().len(), 1);
        assert!(gate.state(kind).is_terminal());
    }
}
