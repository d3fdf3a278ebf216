//! Device identity read from the host OS
//!
//! The device id is app-scoped: a hash of the machine id salted with the
//! application name, so it is stable per host but not the raw machine id.

use sha2::{Digest, Sha256};
use sos_beacon::{DeviceId, DeviceInfo};
use sos_core::config::GeneralConfig;
use sos_core::Error;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const APP_SALT: &str = "sos-beacon";
const DEVICE_ID_LEN: usize = 16;

/// Where the host keeps the files identity is read from
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Candidates for the machine id, first readable one wins
    pub machine_id: Vec<PathBuf>,
    /// `os-release` file
    pub os_release: PathBuf,
    /// Kernel release, used when `os-release` has no build
    pub kernel_release: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            machine_id: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
            os_release: PathBuf::from("/etc/os-release"),
            kernel_release: PathBuf::from("/proc/sys/kernel/osrelease"),
        }
    }
}

/// [`DeviceInfo`] for the machine the beacon runs on
#[derive(Debug, Clone, Default)]
pub struct HostDevice {
    device_id: Option<String>,
    build_number: Option<String>,
    paths: HostPaths,
}

impl HostDevice {
    /// Honour the `[general]` overrides, read the rest from the host
    #[must_use]
    pub fn from_config(general: &GeneralConfig) -> Self {
        Self {
            device_id: general.device_id.clone(),
            build_number: general.build_number.clone(),
            paths: HostPaths::default(),
        }
    }

    /// Read identity from other files
    #[must_use]
    pub fn with_paths(mut self, paths: HostPaths) -> Self {
        self.paths = paths;
        self
    }

    fn machine_id(&self) -> Option<String> {
        self.paths.machine_id.iter().find_map(|path| {
            let id = fs::read_to_string(path).ok()?;
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            debug!(path = %path.display(), "Read machine id");
            Some(id.to_string())
        })
    }
}

impl DeviceInfo for HostDevice {
    fn device_id(&self) -> sos_core::Result<DeviceId> {
        if let Some(id) = &self.device_id {
            return DeviceId::new(id.clone());
        }

        let machine_id = self.machine_id().ok_or_else(Error::device_id_unavailable)?;
        DeviceId::new(derive_device_id(&machine_id))
    }

    fn build_display(&self) -> sos_core::Result<String> {
        if let Some(build) = &self.build_number {
            return Ok(build.clone());
        }

        if let Ok(content) = fs::read_to_string(&self.paths.os_release) {
            if let Some(build) = parse_os_release(&content) {
                return Ok(build);
            }
        }

        let kernel = fs::read_to_string(&self.paths.kernel_release)
            .map_err(|e| Error::build_info_unavailable().with_source(e))?;
        let kernel = kernel.trim();
        if kernel.is_empty() {
            return Err(Error::build_info_unavailable());
        }
        Ok(kernel.to_string())
    }
}

/// Hex SHA-256 of the machine id and app salt, cut to 16 characters
#[must_use]
pub fn derive_device_id(machine_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(machine_id.trim().as_bytes());
    hasher.update(APP_SALT.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(DEVICE_ID_LEN);
    id
}

/// `BUILD_ID`, else `PRETTY_NAME`, from `os-release` content
#[must_use]
pub fn parse_os_release(content: &str) -> Option<String> {
    let value = |key: &str| {
        content.lines().find_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            if k != key {
                return None;
            }
            let v = v.trim().trim_matches(|c| c == '"' || c == '\'');
            (!v.is_empty()).then(|| v.to_string())
        })
    };

    value("BUILD_ID").or_else(|| value("PRETTY_NAME"))
}
