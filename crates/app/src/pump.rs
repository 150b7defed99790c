//! The transport callback thread.
//!
//! Transports publish [`TransportEvent`]s on an unbounded channel, so a send
//! never blocks inside a submit call. [`run`] is the single consumer: it is
//! the one logical thread on which transport events reach the connector.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::connector::NanoConnector;
use crate::ports::{ConnectorObserver, Transport, TransportEvent};

/// Sending half handed to a transport.
pub type EventSender<H> = mpsc::UnboundedSender<TransportEvent<H>>;

/// Receiving half consumed by [`run`].
pub type EventReceiver<H> = mpsc::UnboundedReceiver<TransportEvent<H>>;

/// Create the channel linking a transport to [`run`].
#[must_use]
pub fn channel<H>() -> (EventSender<H>, EventReceiver<H>) {
    mpsc::unbounded_channel()
}

/// Feed every transport event to `connector`, in order, until all senders
/// are dropped.
pub async fn run<T, O>(connector: Arc<NanoConnector<T, O>>, mut events: EventReceiver<T::Handle>)
where
    T: Transport,
    O: ConnectorObserver,
{
    tracing::debug!("transport event pump started");
    while let Some(event) = events.recv().await {
        connector.handle_event(event);
    }
    tracing::debug!("transport event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use nanoled_domain::connection::ConnectionState;
    use nanoled_domain::event::ConnectorEvent;
    use nanoled_domain::protocol::ScanSettings;

    use crate::event_bus::BroadcastObserver;
    use crate::ports::{GattStatus, LinkState, ScannedPeripheral};

    /// Answers `start_scan` and `connect` through the channel.
    struct Looped {
        sender: EventSender<()>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Transport for Looped {
        type Handle = ();

        fn is_enabled(&self) -> bool {
            true
        }
        fn start_scan(&self, _settings: &ScanSettings) {
            self.calls.lock().unwrap().push("start_scan");
            let _ = self.sender.send(TransportEvent::ScanMatch(ScannedPeripheral {
                id: "AA".to_owned(),
                name: None,
            }));
        }
        fn stop_scan(&self) {
            self.calls.lock().unwrap().push("stop_scan");
        }
        fn connect(&self, _peripheral: &ScannedPeripheral) {
            self.calls.lock().unwrap().push("connect");
            let _ = self.sender.send(TransportEvent::ConnectionStateChanged {
                status: GattStatus::Failure(133),
                state: LinkState::Disconnected,
            });
        }
        fn discover_services(&self) {}
        fn submit_read(&self, _handle: &()) {}
        fn submit_write(&self, _handle: &(), _payload: &[u8]) {}
        fn disconnect(&self) {
            self.calls.lock().unwrap().push("disconnect");
        }
        fn close(&self) {
            self.calls.lock().unwrap().push("close");
        }
    }

    #[tokio::test]
    async fn should_drive_connector_until_channel_closes() {
        let (sender, receiver) = channel();
        let observer = BroadcastObserver::new(64);
        let mut rx = observer.subscribe();
        let connector = Arc::new(NanoConnector::new(
            Looped {
                sender,
                calls: Mutex::new(Vec::new()),
            },
            observer,
        ));

        let pump = tokio::spawn(run(Arc::clone(&connector), receiver));
        connector.connect();

        loop {
            if rx.recv().await.unwrap() == ConnectorEvent::Disconnected {
                break;
            }
        }
        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert_eq!(
            *connector.transport().calls.lock().unwrap(),
            vec!["start_scan", "stop_scan", "connect", "disconnect", "close"]
        );

        pump.abort();
    }

    #[tokio::test]
    async fn should_stop_when_all_senders_dropped() {
        let (sender, receiver) = channel::<()>();
        let connector = Arc::new(NanoConnector::new(
            Looped {
                sender: channel().0,
                calls: Mutex::new(Vec::new()),
            },
            BroadcastObserver::new(4),
        ));
        drop(sender);

        run(connector, receiver).await;
    }
}
