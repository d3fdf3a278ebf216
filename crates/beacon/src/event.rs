//! The screen's event channel
//!
//! Platform services never call back into the screen directly; they post a
//! [`ScreenEvent`] and the screen handles it on its own task.

use crate::location::LocationEvent;
use tokio::sync::mpsc;
use tracing::trace;

/// Everything the screen reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    /// The SOS button was pressed
    SosPressed,
    /// The platform answered a permission request
    PermissionResult {
        /// Code the request was issued with
        request_code: i32,
        /// One decision per requested permission, in request order
        grants: Vec<bool>,
    },
    /// A location provider callback
    Location(LocationEvent),
    /// Leave the screen
    Shutdown,
}

/// Posting half of the event channel, cloned into every platform service
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<ScreenEvent>);

impl EventSender {
    /// Queue an event; returns `false` once the screen is gone
    pub fn post(&self, event: ScreenEvent) -> bool {
        trace!(?event, "Posting screen event");
        self.0.send(event).is_ok()
    }
}

/// Receiving half, owned by the screen loop
#[derive(Debug)]
pub struct EventReceiver(mpsc::UnboundedReceiver<ScreenEvent>);

impl EventReceiver {
    /// Wait for the next event, `None` once every sender is dropped
    pub async fn next(&mut self) -> Option<ScreenEvent> {
        self.0.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_next(&mut self) -> Option<ScreenEvent> {
        self.0.try_recv().ok()
    }
}

/// Create a connected sender/receiver pair
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), EventReceiver(rx))
}
