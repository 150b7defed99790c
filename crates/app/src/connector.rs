//! The Nano connector facade.
//!
//! [`NanoConnector`] is the public surface the user interface talks to. It
//! wraps the [`Session`] state machine in a single mutex (the one critical
//! section around the serializer) and delivers observer events outside of it.
//!
//! ```text
//! UI ──set_*()──►┐
//!                ├─► Mutex<Session> ─► Transport::submit_*
//! pump ─events──►┘         │
//!                          └─► Outbox ─► ConnectorObserver
//! ```
//!
//! All methods return immediately; completions arrive through
//! [`handle_event`](NanoConnector::handle_event), usually called by
//! [`crate::pump::run`].

use std::sync::{Mutex, PoisonError};

use nanoled_domain::connection::ConnectionState;
use nanoled_domain::event::ConnectorEvent;
use nanoled_domain::protocol::Characteristic;
use nanoled_domain::state::CachedState;

use crate::outbox::Outbox;
use crate::ports::{ConnectorObserver, Transport, TransportEvent};
use crate::session::Session;

/// Client for one LED controller.
pub struct NanoConnector<T: Transport, O> {
    transport: T,
    observer: O,
    session: Mutex<Session<T::Handle>>,
    outbox: Outbox,
}

impl<T, O> NanoConnector<T, O>
where
    T: Transport,
    O: ConnectorObserver,
{
    pub fn new(transport: T, observer: O) -> Self {
        Self {
            transport,
            observer,
            session: Mutex::new(Session::default()),
            outbox: Outbox::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Hand the transport and observer back, dropping the session.
    ///
    /// Used at shutdown so the transport can be closed by value.
    pub fn into_parts(self) -> (T, O) {
        (self.transport, self.observer)
    }

    /// Run `f` inside the critical section, then deliver what it emitted.
    fn with_session<R>(
        &self,
        f: impl FnOnce(&mut Session<T::Handle>, &T, &mut Vec<ConnectorEvent>) -> R,
    ) -> R {
        let result = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let mut events = Vec::new();
            let result = f(&mut session, &self.transport, &mut events);
            self.outbox.push(events);
            result
        };
        self.outbox.deliver(&self.observer);
        result
    }

    fn read<R>(&self, f: impl FnOnce(&Session<T::Handle>) -> R) -> R {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Begin scanning for the LED controller.
    ///
    /// Returns immediately; wait for [`ConnectorObserver::connected`].
    pub fn connect(&self) {
        self.with_session(|session, transport, events| session.connect(transport, events));
    }

    /// Tear the current session down.
    pub fn disconnect(&self) {
        self.with_session(|session, transport, events| session.disconnect(transport, events));
    }

    /// Feed one event from the transport. Must be called from a single
    /// logical thread, in the order the transport produced the events.
    pub fn handle_event(&self, event: TransportEvent<T::Handle>) {
        self.with_session(|session, transport, events| {
            session.handle_event(event, transport, events);
        });
    }

    // ── Setters ─────────────────────────────────────────────────────────

    pub fn set_brightness(&self, value: u8) {
        self.write(Characteristic::Brightness, value);
    }

    /// Select a style by its index in [`known_styles`](Self::known_styles).
    pub fn set_style(&self, value: u8) {
        self.write(Characteristic::Style, value);
    }

    pub fn set_speed(&self, value: u8) {
        self.write(Characteristic::Speed, value);
    }

    pub fn set_step(&self, value: u8) {
        self.write(Characteristic::Step, value);
    }

    /// Select a pattern by its index in [`known_patterns`](Self::known_patterns).
    pub fn set_pattern(&self, value: u8) {
        self.write(Characteristic::Pattern, value);
    }

    /// Queue a read of the battery voltage; the result arrives as
    /// [`ConnectorObserver::battery_voltage`].
    pub fn refresh_voltage(&self) {
        self.with_session(|session, transport, events| {
            session.refresh_voltage(transport, events);
        });
    }

    fn write(&self, characteristic: Characteristic, value: u8) {
        self.with_session(|session, transport, events| {
            session.write(characteristic, value, transport, events);
        });
    }

    // ── Readers ─────────────────────────────────────────────────────────
    //
    // Meaningful once `connected()` has been observed; `None` means the value
    // has not been read in this session.

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.read(Session::state)
    }

    #[must_use]
    pub fn initial_brightness(&self) -> Option<u8> {
        self.read(|s| s.cache().brightness)
    }

    #[must_use]
    pub fn initial_style(&self) -> Option<u8> {
        self.read(|s| s.cache().style)
    }

    #[must_use]
    pub fn initial_speed(&self) -> Option<u8> {
        self.read(|s| s.cache().speed)
    }

    #[must_use]
    pub fn initial_step(&self) -> Option<u8> {
        self.read(|s| s.cache().step)
    }

    #[must_use]
    pub fn initial_pattern(&self) -> Option<u8> {
        self.read(|s| s.cache().pattern)
    }

    #[must_use]
    pub fn known_styles(&self) -> Option<Vec<String>> {
        self.read(|s| s.cache().known_styles.clone())
    }

    #[must_use]
    pub fn known_patterns(&self) -> Option<Vec<String>> {
        self.read(|s| s.cache().known_patterns.clone())
    }

    /// Most recent successful battery reading.
    #[must_use]
    pub fn last_battery_voltage(&self) -> Option<f32> {
        self.read(|s| s.cache().battery_voltage)
    }

    /// Copy of everything read so far.
    #[must_use]
    pub fn cached_state(&self) -> CachedState {
        self.read(|s| s.cache().clone())
    }

    #[must_use]
    pub fn style_name(&self, index: u8) -> Option<String> {
        self.read(|s| s.cache().style_name(index).map(str::to_owned))
    }

    #[must_use]
    pub fn pattern_name(&self, index: u8) -> Option<String> {
        self.read(|s| s.cache().pattern_name(index).map(str::to_owned))
    }

    #[must_use]
    pub fn style_index(&self, name: &str) -> Option<u8> {
        self.read(|s| s.cache().style_index(name))
    }

    #[must_use]
    pub fn pattern_index(&self, name: &str) -> Option<u8> {
        self.read(|s| s.cache().pattern_index(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Weak};

    use nanoled_domain::protocol::{LED_SERVICE, ScanSettings};

    use crate::ports::{GattCharacteristic, GattService, GattStatus, LinkState, ScannedPeripheral};

    #[derive(Default)]
    struct Submissions(Mutex<Vec<String>>);

    impl Transport for Submissions {
        type Handle = Characteristic;

        fn is_enabled(&self) -> bool {
            true
        }
        fn start_scan(&self, _settings: &ScanSettings) {}
        fn stop_scan(&self) {}
        fn connect(&self, _peripheral: &ScannedPeripheral) {}
        fn discover_services(&self) {}
        fn submit_read(&self, handle: &Characteristic) {
            self.0.lock().unwrap().push(format!("read {handle}"));
        }
        fn submit_write(&self, handle: &Characteristic, payload: &[u8]) {
            self.0.lock().unwrap().push(format!("write {handle} {payload:?}"));
        }
        fn disconnect(&self) {}
        fn close(&self) {}
    }

    /// Writes the brightness back from inside `connected()`.
    #[derive(Default)]
    struct Reentrant {
        connector: Mutex<Weak<NanoConnector<Submissions, Arc<Reentrant>>>>,
        log: Mutex<Vec<ConnectorEvent>>,
    }

    impl ConnectorObserver for Reentrant {
        fn status(&self, message: &str) {
            self.log.lock().unwrap().push(ConnectorEvent::status(message));
        }
        fn connected(&self) {
            self.log.lock().unwrap().push(ConnectorEvent::Connected);
            if let Some(connector) = self.connector.lock().unwrap().upgrade() {
                connector.set_brightness(1);
            }
        }
        fn disconnected(&self) {
            self.log.lock().unwrap().push(ConnectorEvent::Disconnected);
        }
        fn battery_voltage(&self, volts: f32) {
            self.log
                .lock()
                .unwrap()
                .push(ConnectorEvent::BatteryVoltage { volts });
        }
    }

    fn bring_up<O: ConnectorObserver>(connector: &NanoConnector<Submissions, O>) {
        connector.connect();
        connector.handle_event(TransportEvent::ScanMatch(ScannedPeripheral {
            id: "AA".to_owned(),
            name: None,
        }));
        connector.handle_event(TransportEvent::ConnectionStateChanged {
            status: GattStatus::Success,
            state: LinkState::Connected,
        });
        connector.handle_event(TransportEvent::ServicesDiscovered {
            status: GattStatus::Success,
            services: vec![GattService {
                uuid: LED_SERVICE,
                characteristics: Characteristic::ALL
                    .into_iter()
                    .map(|c| GattCharacteristic {
                        uuid: c.uuid(),
                        handle: c,
                    })
                    .collect(),
            }],
        });
        let values: [&[u8]; 8] = [
            &[0x80],
            &[0x02],
            b"Red;Blue;Green",
            &[0x10],
            &[0x04],
            &[0x01],
            b"Solid;Blink",
            &[0x00, 0x00, 0x40, 0x41],
        ];
        for (c, value) in Characteristic::ALL.into_iter().zip(values) {
            connector.handle_event(TransportEvent::ReadComplete {
                characteristic: c.uuid(),
                value: value.to_vec(),
                status: GattStatus::Success,
            });
        }
    }

    #[test]
    fn should_allow_observer_to_call_back_into_connector() {
        let observer = Arc::new(Reentrant::default());
        let connector = Arc::new(NanoConnector::new(
            Submissions::default(),
            Arc::clone(&observer),
        ));
        *observer.connector.lock().unwrap() = Arc::downgrade(&connector);

        bring_up(&connector);

        assert_eq!(connector.state(), ConnectionState::Ready);
        assert_eq!(
            connector.transport().0.lock().unwrap().last().unwrap(),
            "write Brightness [1]"
        );
        let log = observer.log.lock().unwrap();
        let connected_at = log
            .iter()
            .position(|e| *e == ConnectorEvent::Connected)
            .unwrap();
        assert!(log[connected_at + 1..].contains(&ConnectorEvent::status("Starting write Brightness [01]")));
    }

    #[test]
    fn should_expose_names_by_index_and_name() {
        let observer = Arc::new(Reentrant::default());
        let connector = NanoConnector::new(Submissions::default(), observer);
        bring_up(&connector);

        assert_eq!(connector.style_name(2).as_deref(), Some("Green"));
        assert_eq!(connector.pattern_name(5), None);
        assert_eq!(connector.style_index("blue"), Some(1));
        assert_eq!(connector.pattern_index("Blink"), Some(1));
        assert_eq!(connector.last_battery_voltage(), Some(12.0));
    }

    #[test]
    fn should_return_transport_and_observer_from_parts() {
        let observer = Arc::new(Reentrant::default());
        let connector = NanoConnector::new(Submissions::default(), Arc::clone(&observer));
        bring_up(&connector);

        let (transport, returned) = connector.into_parts();

        assert!(Arc::ptr_eq(&returned, &observer));
        assert_eq!(transport.0.lock().unwrap().len(), 8);
        assert!(observer.log.lock().unwrap().contains(&ConnectorEvent::Connected));
    }

    #[test]
    fn should_report_absent_values_before_connect() {
        let observer = Arc::new(Reentrant::default());
        let connector = NanoConnector::new(Submissions::default(), observer);

        assert_eq!(connector.state(), ConnectionState::Idle);
        assert_eq!(connector.initial_brightness(), None);
        assert_eq!(connector.known_styles(), None);
        assert_eq!(connector.cached_state(), CachedState::default());
    }
}
