//! Path-bound store handles

use crate::error::ApiResult;
use crate::path::StorePath;
use crate::RemoteStore;
use serde::Serialize;
use serde_json::Value;

/// A store handle pointing at one location in the tree.
///
/// Holds no state beyond the path, so it is cheap to clone and safe to
/// share; `child` derives handles further down the tree.
#[derive(Debug, Clone)]
pub struct DatabaseRef<S> {
    store: S,
    path: StorePath,
}

impl<S: RemoteStore> DatabaseRef<S> {
    /// Bind a store to a path
    pub fn new(store: S, path: StorePath) -> Self {
        Self { store, path }
    }

    /// Handle for a direct child
    pub fn child(&self, key: &str) -> ApiResult<Self> {
        Ok(Self {
            store: self.store.clone(),
            path: self.path.child(key)?,
        })
    }

    /// Where this handle points
    #[must_use]
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the value at this location
    pub async fn set_value<T: Serialize + ?Sized>(&self, value: &T) -> ApiResult<()> {
        let value = serde_json::to_value(value)?;
        self.set_json(value).await
    }

    /// Replace the value at this location with an already built JSON value
    pub async fn set_json(&self, value: Value) -> ApiResult<()> {
        self.store.set(&self.path, value).await
    }

    /// Read the value at this location
    pub async fn get_value(&self) -> ApiResult<Option<Value>> {
        self.store.get(&self.path).await
    }
}
