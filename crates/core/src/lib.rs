//! Core utilities for the SOS beacon
//!
//! This crate provides functionality shared by every other crate in the workspace:
//!
//! - **Error handling**: Structured errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based configuration with environment overrides and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use sos_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("Writing to {}", config.schema.store.database_url);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
}
