//! Connection state machine.
//!
//! A [`Session`] owns everything that lives for one GATT session: the
//! connection state, the handle catalog, the cached initial values and the
//! operation queue. Every inbound stimulus (user call or transport event) is
//! one method, dispatched on the current [`ConnectionState`]. Methods never
//! call the observer; they append [`ConnectorEvent`]s to `events` and the
//! facade delivers them once the critical section is left.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use nanoled_domain::codec::encode_level;
use nanoled_domain::connection::ConnectionState;
use nanoled_domain::event::ConnectorEvent;
use nanoled_domain::operation::{Operation, OperationKind, SessionId};
use nanoled_domain::protocol::{Characteristic, LED_SERVICE, ScanSettings};
use nanoled_domain::state::CachedState;

use crate::ports::{
    GattService, GattStatus, LinkState, ScannedPeripheral, Transport, TransportEvent,
};
use crate::serializer::{Completion, Dispatch, OperationQueue};

/// A request made before the handle catalog exists.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Read(Characteristic),
    Write {
        characteristic: Characteristic,
        payload: Vec<u8>,
    },
}

/// State of the single connector session.
#[derive(Debug)]
pub struct Session<H> {
    state: ConnectionState,
    id: SessionId,
    peripheral: Option<ScannedPeripheral>,
    catalog: HashMap<Characteristic, H>,
    cache: CachedState,
    queue: OperationQueue<H>,
    deferred: Vec<Intent>,
    gatt_open: bool,
    connected_emitted: bool,
}

impl<H> Default for Session<H> {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            id: SessionId::default(),
            peripheral: None,
            catalog: HashMap::new(),
            cache: CachedState::default(),
            queue: OperationQueue::default(),
            deferred: Vec::new(),
            gatt_open: false,
            connected_emitted: false,
        }
    }
}

impl<H: Clone + fmt::Debug> Session<H> {
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Id of the current (or most recent) session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn cache(&self) -> &CachedState {
        &self.cache
    }

    /// The serializer, for inspection.
    #[must_use]
    pub fn queue(&self) -> &OperationQueue<H> {
        &self.queue
    }

    /// Start a new session by scanning for the LED controller.
    ///
    /// Idempotent while scanning; a no-op (with a status line) while a
    /// session is being set up or is ready.
    pub fn connect<T>(&mut self, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        match self.state {
            ConnectionState::Scanning => {
                tracing::debug!(session = %self.id, "connect while scanning ignored");
                return;
            }
            ConnectionState::Connecting
            | ConnectionState::Discovering
            | ConnectionState::Initializing => {
                events.push(ConnectorEvent::status("Already connecting."));
                return;
            }
            ConnectionState::Ready => {
                events.push(ConnectorEvent::status("Already connected."));
                return;
            }
            ConnectionState::Idle | ConnectionState::Disconnected => {}
        }

        if !transport.is_enabled() {
            tracing::warn!(state = %self.state, "bluetooth adapter disabled");
            events.push(ConnectorEvent::status("Bluetooth adapter disabled!"));
            return;
        }

        self.reset();
        self.id = self.id.next();
        self.state = ConnectionState::Scanning;
        tracing::info!(session = %self.id, "scanning for LED controller");
        events.push(ConnectorEvent::status("Scanning for LED controller..."));
        transport.start_scan(&ScanSettings::led_controller());
    }

    /// User-requested teardown.
    pub fn disconnect<T>(&mut self, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        if self.state.has_session() {
            self.teardown("Disconnect requested.", transport, events);
        } else {
            events.push(ConnectorEvent::status("Not connected."));
        }
    }

    /// Write a single-byte setting.
    ///
    /// Queued behind whatever is in flight once handles exist, remembered
    /// until discovery completes before that, ignored without a session.
    pub fn write<T>(
        &mut self,
        characteristic: Characteristic,
        value: u8,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        let intent = Intent::Write {
            characteristic,
            payload: encode_level(value),
        };
        self.submit(intent, transport, events);
    }

    /// Read the battery voltage again.
    pub fn refresh_voltage<T>(&mut self, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        self.submit(
            Intent::Read(Characteristic::BatteryVoltage),
            transport,
            events,
        );
    }

    /// Feed one event from the transport.
    pub fn handle_event<T>(
        &mut self,
        event: TransportEvent<H>,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        if !self.state.has_session() {
            tracing::debug!(state = %self.state, ?event, "transport event without session ignored");
            return;
        }
        // leftovers from the previous link reach a new session while it scans
        if !self.gatt_open
            && !matches!(
                event,
                TransportEvent::ScanMatch(_) | TransportEvent::ScanFailed { .. }
            )
        {
            tracing::debug!(session = %self.id, ?event, "GATT event before connect ignored");
            return;
        }

        match event {
            TransportEvent::ScanMatch(peripheral) => {
                self.on_scan_match(peripheral, transport, events);
            }
            TransportEvent::ScanFailed { reason } => {
                if self.state == ConnectionState::Scanning {
                    self.teardown(&format!("Scan failed: {reason}"), transport, events);
                } else {
                    tracing::debug!(state = %self.state, %reason, "late scan failure ignored");
                }
            }
            TransportEvent::ConnectionStateChanged { status, state } => {
                self.on_connection_state(status, state, transport, events);
            }
            TransportEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(status, &services, transport, events);
            }
            TransportEvent::ReadComplete {
                characteristic,
                value,
                status,
            } => {
                let completion = Completion {
                    kind: OperationKind::Read,
                    characteristic,
                    status,
                    value,
                };
                self.on_completion(completion, transport, events);
            }
            TransportEvent::WriteComplete {
                characteristic,
                status,
            } => {
                let completion = Completion {
                    kind: OperationKind::Write,
                    characteristic,
                    status,
                    value: Vec::new(),
                };
                self.on_completion(completion, transport, events);
            }
        }
    }

    fn reset(&mut self) {
        self.peripheral = None;
        self.catalog.clear();
        self.cache = CachedState::default();
        self.queue.clear();
        self.deferred.clear();
        self.gatt_open = false;
        self.connected_emitted = false;
    }

    fn submit<T>(&mut self, intent: Intent, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        if !self.state.has_session() {
            tracing::debug!(state = %self.state, ?intent, "request without session ignored");
            events.push(ConnectorEvent::status(format!(
                "Not connected, ignoring {}",
                describe(&intent)
            )));
        } else if self.state.has_handles() {
            self.enqueue(intent, transport, events);
        } else {
            events.push(ConnectorEvent::status(format!(
                "Deferring {} until the device is discovered",
                describe(&intent)
            )));
            self.deferred.push(intent);
        }
    }

    fn enqueue<T>(&mut self, intent: Intent, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        let characteristic = match &intent {
            Intent::Read(c) | Intent::Write { characteristic: c, .. } => *c,
        };
        let Some(handle) = self.catalog.get(&characteristic).cloned() else {
            // the catalog is complete whenever handles exist
            tracing::error!(session = %self.id, %characteristic, "no handle in catalog");
            events.push(ConnectorEvent::status(format!(
                "ERROR: no handle for {characteristic}"
            )));
            return;
        };
        let op = match intent {
            Intent::Read(c) => Operation::read(self.id, c, handle),
            Intent::Write {
                characteristic,
                payload,
            } => Operation::write(self.id, characteristic, handle, payload),
        };
        self.queue.enqueue(op, transport, events);
    }

    fn on_scan_match<T>(
        &mut self,
        peripheral: ScannedPeripheral,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        if self.state != ConnectionState::Scanning {
            tracing::debug!(state = %self.state, id = %peripheral.id, "late scan match ignored");
            return;
        }
        let name = peripheral.display_name().to_owned();
        tracing::info!(session = %self.id, peripheral = %name, "LED controller found");
        events.push(ConnectorEvent::status(format!("Found {name}")));

        transport.stop_scan();
        events.push(ConnectorEvent::status(format!("Connecting to {name}...")));
        transport.connect(&peripheral);
        self.gatt_open = true;
        self.peripheral = Some(peripheral);
        self.state = ConnectionState::Connecting;
    }

    fn on_connection_state<T>(
        &mut self,
        status: GattStatus,
        link: LinkState,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        tracing::info!(session = %self.id, state = %self.state, %status, link = %link, "connection state changed");
        events.push(ConnectorEvent::status(format!(
            "BLE connect state changed. Status: {status}, state: {link}"
        )));

        match (status, link) {
            (GattStatus::Success, LinkState::Connected) => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Discovering;
                    events.push(ConnectorEvent::status("Discovering services..."));
                    transport.discover_services();
                } else {
                    tracing::debug!(state = %self.state, "redundant connected event ignored");
                }
            }
            (GattStatus::Success, LinkState::Disconnected) => {
                self.teardown("Disconnected from device.", transport, events);
            }
            (GattStatus::Failure(_), _) => {
                self.teardown(
                    &format!("Connection failed with status {status}"),
                    transport,
                    events,
                );
            }
        }
    }

    fn on_services_discovered<T>(
        &mut self,
        status: GattStatus,
        services: &[GattService<H>],
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        if self.state != ConnectionState::Discovering {
            tracing::debug!(state = %self.state, "unexpected service discovery result ignored");
            return;
        }
        if !status.is_success() {
            self.teardown(
                &format!("Service discovery failed with status {status}"),
                transport,
                events,
            );
            return;
        }
        let Some(service) = services.iter().find(|s| s.uuid == LED_SERVICE) else {
            self.teardown("LED service not found!", transport, events);
            return;
        };

        let mut catalog = HashMap::with_capacity(Characteristic::ALL.len());
        for characteristic in Characteristic::ALL {
            match service.find_characteristic(characteristic.uuid()) {
                Some(handle) => {
                    catalog.insert(characteristic, handle.clone());
                }
                None => {
                    tracing::warn!(session = %self.id, %characteristic, "characteristic missing");
                    events.push(ConnectorEvent::status(format!(
                        "Characteristic '{characteristic}' not found!"
                    )));
                }
            }
        }
        if catalog.len() != Characteristic::ALL.len() {
            self.teardown(
                "At least one characteristic was not found in the service.",
                transport,
                events,
            );
            return;
        }

        self.catalog = catalog;
        self.state = ConnectionState::Initializing;
        tracing::info!(session = %self.id, "reading initial values");
        events.push(ConnectorEvent::status("Reading initial values..."));

        for characteristic in Characteristic::ALL {
            self.enqueue(Intent::Read(characteristic), transport, events);
        }
        for intent in std::mem::take(&mut self.deferred) {
            self.enqueue(intent, transport, events);
        }
    }

    fn on_completion<T>(
        &mut self,
        completion: Completion,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) where
        T: Transport<Handle = H>,
    {
        let dispatch = self
            .queue
            .on_completion(completion, &mut self.cache, transport, events);
        if dispatch == Dispatch::Idle && self.state == ConnectionState::Initializing {
            self.check_ready(transport, events);
        }
    }

    fn check_ready<T>(&mut self, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        if !self.cache.is_complete() {
            let missing = self.cache.missing();
            let mut reason = String::from("Initialization incomplete; missing:");
            for (i, characteristic) in missing.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                let _ = write!(reason, "{sep}{characteristic}");
            }
            self.teardown(&reason, transport, events);
            return;
        }

        self.state = ConnectionState::Ready;
        tracing::info!(session = %self.id, "session ready");
        events.push(ConnectorEvent::status("Connected and ready."));
        if !self.connected_emitted {
            self.connected_emitted = true;
            events.push(ConnectorEvent::Connected);
        }
    }

    fn teardown<T>(&mut self, reason: &str, transport: &T, events: &mut Vec<ConnectorEvent>)
    where
        T: Transport<Handle = H>,
    {
        tracing::warn!(
            session = %self.id,
            state = %self.state,
            peripheral = self.peripheral.as_ref().map(ScannedPeripheral::display_name),
            reason,
            "session torn down"
        );
        events.push(ConnectorEvent::status(reason));

        let dropped = self.queue.clear() + self.deferred.len();
        if dropped > 0 {
            tracing::debug!(session = %self.id, dropped, "operations dropped");
        }
        self.deferred.clear();
        self.catalog.clear();

        if self.state == ConnectionState::Scanning {
            transport.stop_scan();
        }
        if self.gatt_open {
            transport.disconnect();
            transport.close();
            self.gatt_open = false;
        }
        self.state = ConnectionState::Disconnected;
        events.push(ConnectorEvent::Disconnected);
    }
}

fn describe(intent: &Intent) -> String {
    match intent {
        Intent::Read(characteristic) => format!("read {characteristic}"),
        Intent::Write {
            characteristic,
            payload,
        } => format!("write {characteristic} {payload:02x?}"),
    }
}
