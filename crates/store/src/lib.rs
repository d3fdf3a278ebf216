//! Remote key-value store client for the SOS beacon
//!
//! Device records live in a hosted real-time database addressed by slash
//! separated paths such as `users/{deviceId}/latitude`. Every write is an
//! independent `set` of one path; there are no transactions.
//!
//! # Features
//!
//! - **[`RemoteStore`]**: the seam the beacon writes through
//! - **[`RtdbClient`]**: Firebase Realtime Database over its REST API
//! - **[`MemoryStore`]**: an in-process tree for tests and dry runs
//! - **[`DatabaseRef`]**: a store handle bound to a path, with `child` navigation
//!
//! # Example
//!
//! ```rust,no_run
//! use sos_store::{DatabaseRef, RtdbClient, StoreClientConfig, StorePath};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreClientConfig::new("https://demo.firebaseio.com");
//!     let client = RtdbClient::with_config(config)?;
//!
//!     let users = DatabaseRef::new(client, StorePath::parse("users")?);
//!     users.child("a1b2c3")?.child("latitude")?.set_value(&12.34).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod path;
pub mod reference;

pub use client::RtdbClient;
pub use config::StoreClientConfig;
pub use error::{ApiError, ApiResult};
pub use memory::MemoryStore;
pub use path::StorePath;
pub use reference::DatabaseRef;

use serde_json::Value;
use std::future::Future;

/// A hosted key-value tree with per-path `set` semantics.
///
/// Implementations are cheap to clone and safe to share across tasks; a
/// clone addresses the same backing store.
pub trait RemoteStore: Clone + Send + Sync + 'static {
    /// Replace the value at `path`. `null` removes it.
    fn set(&self, path: &StorePath, value: Value) -> impl Future<Output = ApiResult<()>> + Send;

    /// Read the value at `path`, `None` when nothing is stored there.
    fn get(&self, path: &StorePath) -> impl Future<Output = ApiResult<Option<Value>>> + Send;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::RtdbClient;
    pub use crate::config::StoreClientConfig;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::memory::MemoryStore;
    pub use crate::path::StorePath;
    pub use crate::reference::DatabaseRef;
    pub use crate::RemoteStore;
}
