//! In-process fan-out of connector events backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use nanoled_domain::event::ConnectorEvent;

use crate::ports::ConnectorObserver;

/// [`ConnectorObserver`] that republishes every event on a tokio
/// [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Slow subscribers see
/// [`broadcast::error::RecvError::Lagged`] rather than blocking the connector.
pub struct BroadcastObserver {
    sender: broadcast::Sender<ConnectorEvent>,
}

impl BroadcastObserver {
    /// Create a new observer with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to connector events.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: ConnectorEvent) {
        // fails only when there are zero receivers
        let _ = self.sender.send(event);
    }
}

impl ConnectorObserver for BroadcastObserver {
    fn status(&self, message: &str) {
        self.publish(ConnectorEvent::status(message));
    }

    fn connected(&self) {
        self.publish(ConnectorEvent::Connected);
    }

    fn disconnected(&self) {
        self.publish(ConnectorEvent::Disconnected);
    }

    fn battery_voltage(&self, volts: f32) {
        self.publish(ConnectorEvent::BatteryVoltage { volts });
    }

    fn notify(&self, event: &ConnectorEvent) {
        self.publish(event.clone());
    }
}
