//! Terminal helpers for the SOS beacon
//!
//! Provides shared CLI functionality:
//! - Status and key/value output
//! - Spinners for pending operations
//! - Yes/no prompts

#![warn(missing_docs)]

pub mod output;
pub mod progress;
pub mod prompt;
