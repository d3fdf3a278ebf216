//! In-process store used by tests and `--dry-run`

use crate::error::{ApiError, ApiResult};
use crate::path::StorePath;
use crate::RemoteStore;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    tree: Map<String, Value>,
    writes: Vec<(String, Value)>,
    failure: Option<String>,
}

/// A JSON tree held in memory with the same set/get semantics as the remote database.
///
/// Clones share the tree. Every accepted `set` is also appended to a write log
/// so callers can assert on the exact sequence of writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` fail with `message`, or succeed again with `None`
    pub fn fail_writes(&self, message: Option<&str>) {
        self.lock().failure = message.map(str::to_string);
    }

    /// Accepted writes in order, as `(path, value)`
    #[must_use]
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.lock().writes.clone()
    }

    /// Accepted writes to one path
    #[must_use]
    pub fn writes_to(&self, path: &str) -> Vec<Value> {
        self.lock()
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// The whole tree as one JSON object
    #[must_use]
    pub fn snapshot(&self) -> Value {
        Value::Object(self.lock().tree.clone())
    }

    /// Synchronous read of a path
    #[must_use]
    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        let inner = self.lock();
        let (last, parents) = path.segments().split_last()?;
        let mut node = &inner.tree;
        for segment in parents {
            node = node.get(segment)?.as_object()?;
        }
        node.get(last).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, path: &StorePath, value: Value) -> ApiResult<()> {
        let mut inner = self.lock();
        if let Some(message) = &inner.failure {
            return Err(ApiError::Simulated(message.clone()));
        }

        inner.writes.push((path.to_string(), value.clone()));

        let Some((last, parents)) = path.segments().split_last() else {
            return Ok(());
        };

        let mut node = &mut inner.tree;
        for segment in parents {
            let entry = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(child) = entry else {
                unreachable!("entry was just made an object");
            };
            node = child;
        }

        if value.is_null() {
            node.remove(last);
        } else {
            node.insert(last.clone(), value);
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    async fn set(&self, path: &StorePath, value: Value) -> ApiResult<()> {
        self.apply(path, value)
    }

    async fn get(&self, path: &StorePath) -> ApiResult<Option<Value>> {
        Ok(self.value_at(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_set_builds_nested_tree() {
        let store = MemoryStore::new();
        store.set(&path("users/dev/latitude"), json!(12.34)).await.unwrap();
        store.set(&path("users/dev/longitude"), json!(56.78)).await.unwrap();

        assert_eq!(
            store.snapshot(),
            json!({"users": {"dev": {"latitude": 12.34, "longitude": 56.78}}})
        );
        assert_eq!(
            store.get(&path("users/dev")).await.unwrap(),
            Some(json!({"latitude": 12.34, "longitude": 56.78}))
        );
    }

    #[tokio::test]
    async fn test_last_write_wins_and_is_logged() {
        let store = MemoryStore::new();
        store.set(&path("users/dev/timestamp"), json!("a")).await.unwrap();
        store.set(&path("users/dev/timestamp"), json!("b")).await.unwrap();

        assert_eq!(store.value_at(&path("users/dev/timestamp")), Some(json!("b")));
        assert_eq!(store.writes_to("users/dev/timestamp"), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_null_removes() {
        let store = MemoryStore::new();
        store.set(&path("users/dev/buildNumber"), json!("X1")).await.unwrap();
        store.set(&path("users/dev/buildNumber"), Value::Null).await.unwrap();

        assert_eq!(store.get(&path("users/dev/buildNumber")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_writes(Some("offline"));

        let err = store.set(&path("users/dev/latitude"), json!(1.0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Simulated(_)));
        assert!(store.writes().is_empty());

        store.fail_writes(None);
        assert!(store.set(&path("users/dev/latitude"), json!(1.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.set(&path("users/dev/latitude"), json!(1.0)).await.unwrap();
        assert_eq!(store.writes().len(), 1);
    }
}
