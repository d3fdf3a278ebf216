//! Fire-and-forget writes to the device record
//!
//! Each field is an independent `set` on `{root}/{deviceId}/{field}`. Writes
//! are spawned onto the runtime and never awaited by the screen; a failed
//! write is logged and counted, and the user is not told.

use crate::device::DeviceId;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sos_store::{DatabaseRef, RemoteStore, StorePath};
use sos_telemetry::{counters, metrics, Timer};
use std::fmt;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Fields of a device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRecordField {
    /// Latitude of the last reported fix
    #[serde(rename = "latitude")]
    Latitude,
    /// Longitude of the last reported fix
    #[serde(rename = "longitude")]
    Longitude,
    /// Local time the fix was reported
    #[serde(rename = "timestamp")]
    Timestamp,
    /// Platform build identifier
    #[serde(rename = "buildNumber")]
    BuildNumber,
}

impl DeviceRecordField {
    /// Key of the field inside the record
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Timestamp => "timestamp",
            Self::BuildNumber => "buildNumber",
        }
    }
}

impl fmt::Display for DeviceRecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Writes fields of one device record
pub struct RecordWriter<S> {
    record: DatabaseRef<S>,
    pending: JoinSet<()>,
}

impl<S: RemoteStore> RecordWriter<S> {
    /// Writer for `{root}/{device_id}`
    pub fn new(store: S, root: &str, device_id: &DeviceId) -> Result<Self> {
        let record = DatabaseRef::new(store, StorePath::parse(root)?).child(device_id.as_str())?;
        Ok(Self {
            record,
            pending: JoinSet::new(),
        })
    }

    /// The record this writer targets
    #[must_use]
    pub fn record(&self) -> &DatabaseRef<S> {
        &self.record
    }

    /// Start an independent write of one field. Must be called inside a
    /// tokio runtime.
    pub fn write(&mut self, field: DeviceRecordField, value: Value) -> Result<()> {
        let target = self.record.child(field.key())?;
        debug!(path = %target.path(), "Queueing store write");

        self.pending.spawn(async move {
            let timer = Timer::start(counters::STORE_WRITE_MS);
            let result = target.set_json(value).await;
            timer.stop();

            match result {
                Ok(()) => metrics().increment(counters::STORE_WRITES),
                Err(e) => {
                    metrics().increment(counters::STORE_WRITE_FAILURES);
                    warn!(path = %target.path(), error = %e, "Store write failed");
                }
            }
        });

        self.reap();
        Ok(())
    }

    /// Writes still in flight
    pub fn pending(&mut self) -> usize {
        self.reap();
        self.pending.len()
    }

    /// Wait for every queued write to finish
    pub async fn drain(&mut self) {
        while let Some(joined) = self.pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Store write task did not complete");
            }
        }
    }

    fn reap(&mut self) {
        while let Some(joined) = self.pending.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Store write task did not complete");
            }
        }
    }
}

impl<S> fmt::Debug for RecordWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordWriter")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sos_store::MemoryStore;

    fn device() -> DeviceId {
        DeviceId::new("a1b2c3").unwrap()
    }

    #[test]
    fn test_field_keys() {
        assert_eq!(DeviceRecordField::BuildNumber.key(), "buildNumber");
        assert_eq!(
            serde_json::to_value(DeviceRecordField::Timestamp).unwrap(),
            json!("timestamp")
        );
    }

    #[tokio::test]
    async fn test_writes_land_under_device_record() {
        let store = MemoryStore::new();
        let mut writer = RecordWriter::new(store.clone(), "users", &device()).unwrap();

        writer.write(DeviceRecordField::Latitude, json!(12.34)).unwrap();
        writer.write(DeviceRecordField::BuildNumber, json!("QP1A")).unwrap();
        writer.drain().await;

        assert_eq!(writer.pending(), 0);
        assert_eq!(
            store.snapshot(),
            json!({"users": {"a1b2c3": {"latitude": 12.34, "buildNumber": "QP1A"}}})
        );
    }

    #[tokio::test]
    async fn test_failed_write_is_swallowed() {
        let store = MemoryStore::new();
        store.fail_writes(Some("offline"));
        let mut writer = RecordWriter::new(store.clone(), "users", &device()).unwrap();

        writer.write(DeviceRecordField::Latitude, json!(1.0)).unwrap();
        writer.drain().await;

        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_invalid_root_rejected() {
        assert!(RecordWriter::new(MemoryStore::new(), "", &device()).is_err());
        assert!(RecordWriter::new(MemoryStore::new(), "us.ers", &device()).is_err());
    }
}
