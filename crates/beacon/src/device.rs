//! Device identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a device record under the store root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a non-blank identifier
    pub fn new(id: impl Into<String>) -> sos_core::Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(sos_core::Error::device_id_unavailable());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Read-only facts about the device the screen runs on
pub trait DeviceInfo: Send {
    /// Stable identifier, used as the record key
    fn device_id(&self) -> sos_core::Result<DeviceId>;

    /// Human-readable platform build identifier
    fn build_display(&self) -> sos_core::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_core::ErrorCode;

    #[test]
    fn test_device_id_trims() {
        let id = DeviceId::new("  a1b2c3\n").unwrap();
        assert_eq!(id.as_str(), "a1b2c3");
        assert_eq!(id.to_string(), "a1b2c3");
    }

    #[test]
    fn test_blank_device_id() {
        let err = DeviceId::new("   ").unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceIdUnavailable);
    }
}
