//! Host implementations of the SOS beacon platform services
//!
//! Runs the beacon screen on a desktop or embedded Linux host:
//! - [`HostDevice`]: device id from the machine id, build from `os-release`
//! - [`TerminalPermissions`]: configured grants plus yes/no terminal prompts
//! - [`GpsdProvider`] / [`FixedProvider`]: location from gpsd or configuration
//! - [`TerminalDisplay`]: label and messages on the terminal

#![warn(missing_docs)]

pub mod device;
pub mod error;
pub mod location;
pub mod terminal;

pub use device::{HostDevice, HostPaths};
pub use error::{HostError, Result};
pub use location::{provider_from_config, FixedProvider, GpsdProvider};
pub use terminal::{spawn_input, InputMode, TerminalDisplay, TerminalPermissions};
