//! Device event broadcast.
//!
//! Connection state and errors are published once on a broadcast
//! channel; every subscriber observes the same ordered sequence of
//! transitions. Two independent UI surfaces watching the same device
//! therefore never diverge in believed connection state.

use tokio::sync::broadcast;

/// Events published by the transport and protocol layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The transport opened (`true`) or closed (`false`).
    ConnectionChanged(bool),
    /// A non-fatal error occurred (failed connect, I/O failure).
    Error(String),
    /// A response line arrived from the device. Surfaced verbatim so a
    /// UI can display raw traffic.
    LineReceived(String),
}

/// Broadcast channel for [`DeviceEvent`]s.
///
/// Cloning an `EventBus` clones the sending side; all clones feed the
/// same set of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber. Only events published after this call
    /// are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is
    /// simply dropped.
    pub fn publish(&self, event: DeviceEvent) {
        tracing::trace!(?event, "device event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
