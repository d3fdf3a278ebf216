//! Configuration loading and schema definitions

mod loader;
mod schema;

pub use loader::{Config, ENV_AUTH_TOKEN, ENV_DATABASE_URL, ENV_DEVICE_ID, ENV_TIMEOUT_SECS};
pub use schema::*;
