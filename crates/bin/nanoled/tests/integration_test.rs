//! End-to-end tests for the full nanoled stack.
//!
//! Each test wires the real connector, event pump and broadcast observer to
//! the virtual LED controller. No radio is involved.

use std::sync::Arc;
use std::time::Duration;

use nanoled_adapter_virtual::{VirtualConfig, VirtualTransport};
use nanoled_app::NanoConnector;
use nanoled_app::event_bus::BroadcastObserver;
use nanoled_app::pump;
use nanoled_domain::connection::ConnectionState;
use nanoled_domain::event::ConnectorEvent;
use nanoled_domain::protocol::Characteristic;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

type Connector = NanoConnector<VirtualTransport, BroadcastObserver>;

struct Stack {
    connector: Arc<Connector>,
    events: broadcast::Receiver<ConnectorEvent>,
    pump: JoinHandle<()>,
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

fn stack(config: VirtualConfig) -> Stack {
    let (sender, receiver) = pump::channel();
    let observer = BroadcastObserver::new(256);
    let events = observer.subscribe();
    let connector = Arc::new(NanoConnector::new(
        VirtualTransport::new(config, sender),
        observer,
    ));
    let pump = tokio::spawn(pump::run(Arc::clone(&connector), receiver));
    Stack {
        connector,
        events,
        pump,
    }
}

/// Collect events until one matches `done`, failing after a second.
async fn wait_for(
    events: &mut broadcast::Receiver<ConnectorEvent>,
    done: impl Fn(&ConnectorEvent) -> bool,
) -> Vec<ConnectorEvent> {
    let mut seen = Vec::new();
    let outcome = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let event = events.recv().await.expect("observer channel should stay open");
            let finished = done(&event);
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out, events so far: {seen:?}");
    seen
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_connect_and_cache_initial_values() {
    let mut stack = stack(VirtualConfig::default());
    stack.connector.connect();

    let seen = wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;

    assert!(seen.contains(&ConnectorEvent::status("Scanning for LED controller...")));
    assert_eq!(stack.connector.state(), ConnectionState::Ready);
    assert_eq!(stack.connector.initial_brightness(), Some(128));
    assert_eq!(stack.connector.initial_speed(), Some(16));
    assert_eq!(
        stack.connector.known_styles(),
        Some(vec!["Solid".to_owned(), "Rainbow".to_owned(), "Chase".to_owned()])
    );
    assert_eq!(stack.connector.last_battery_voltage(), Some(3.7));
    assert_eq!(stack.connector.style_index("Chase"), Some(2));
}

#[tokio::test]
async fn should_write_settings_through_to_the_peripheral() {
    let mut stack = stack(VirtualConfig::default());
    stack.connector.connect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;

    stack.connector.set_brightness(42);
    stack.connector.set_pattern(1);
    wait_for(&mut stack.events, |e| {
        *e == ConnectorEvent::status(format!("Wrote {}", Characteristic::Pattern))
    })
    .await;

    let registers = stack.connector.transport().registers();
    assert_eq!(registers.brightness, 42);
    assert_eq!(registers.pattern, 1);
}

#[tokio::test]
async fn should_report_refreshed_battery_voltage() {
    let mut stack = stack(VirtualConfig::default());
    stack.connector.connect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;

    stack.connector.transport().set_battery_voltage(3.25);
    stack.connector.refresh_voltage();
    wait_for(&mut stack.events, |e| {
        *e == ConnectorEvent::BatteryVoltage { volts: 3.25 }
    })
    .await;

    assert_eq!(stack.connector.last_battery_voltage(), Some(3.25));
}

#[tokio::test]
async fn should_disconnect_on_request_and_reconnect() {
    let mut stack = stack(VirtualConfig::default());
    stack.connector.connect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;

    stack.connector.disconnect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Disconnected).await;
    assert_eq!(stack.connector.state(), ConnectionState::Disconnected);

    stack.connector.connect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;
    assert_eq!(stack.connector.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn should_tear_down_when_link_drops() {
    let mut stack = stack(VirtualConfig::default());
    stack.connector.connect();
    wait_for(&mut stack.events, |e| *e == ConnectorEvent::Connected).await;

    stack.connector.transport().drop_link();
    let seen = wait_for(&mut stack.events, |e| *e == ConnectorEvent::Disconnected).await;

    assert!(seen.contains(&ConnectorEvent::status("Disconnected from device.")));
    assert_eq!(stack.connector.state(), ConnectionState::Disconnected);
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_give_up_when_a_characteristic_is_missing() {
    let mut stack = stack(VirtualConfig {
        omit_characteristics: vec![Characteristic::Step],
        ..VirtualConfig::default()
    });
    stack.connector.connect();

    let seen = wait_for(&mut stack.events, |e| *e == ConnectorEvent::Disconnected).await;

    assert!(!seen.contains(&ConnectorEvent::Connected));
    assert!(seen.contains(&ConnectorEvent::status(
        "At least one characteristic was not found in the service."
    )));
}

#[tokio::test]
async fn should_refuse_to_scan_with_adapter_disabled() {
    let mut stack = stack(VirtualConfig {
        adapter_enabled: false,
        ..VirtualConfig::default()
    });
    stack.connector.connect();

    wait_for(&mut stack.events, |e| {
        *e == ConnectorEvent::status("Bluetooth adapter disabled!")
    })
    .await;
    assert!(!stack.connector.state().has_session());
}
