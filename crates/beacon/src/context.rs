//! Per-session handles shared by the report flows

use crate::device::DeviceId;
use crate::error::Result;
use crate::location::LocationProvider;
use crate::record::RecordWriter;
use sos_store::RemoteStore;

/// What one screen session writes to and reads from.
///
/// Built once before the screen starts, torn down with it. The screen holds
/// the only copy, so nothing here is global.
pub struct SessionContext<S> {
    device_id: DeviceId,
    /// Writer for this device's record
    pub writer: RecordWriter<S>,
    /// Location service the SOS report arms
    pub location: Box<dyn LocationProvider>,
}

impl<S: RemoteStore> SessionContext<S> {
    /// Bind a store and a location provider to a device record under `root`
    pub fn new(
        device_id: DeviceId,
        store: S,
        root: &str,
        location: Box<dyn LocationProvider>,
    ) -> Result<Self> {
        let writer = RecordWriter::new(store, root, &device_id)?;
        Ok(Self {
            device_id,
            writer,
            location,
        })
    }

    /// Record key of this device
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }
}

impl<S> std::fmt::Debug for SessionContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}
