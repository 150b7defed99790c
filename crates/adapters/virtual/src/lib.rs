//! # nanoled-adapter-virtual
//!
//! A simulated LED controller behind the [`Transport`] port, for demos and
//! end-to-end tests without a radio.
//!
//! ## Behaviour
//!
//! | Call | Answer |
//! |------|--------|
//! | `start_scan` | one `ScanMatch` for the virtual peripheral |
//! | `connect` | `ConnectionStateChanged { Success, Connected }` |
//! | `discover_services` | the LED service, minus `omit_characteristics` |
//! | `submit_read` / `submit_write` | register file semantics, see [`Registers`] |
//! | `disconnect` | `ConnectionStateChanged { Success, Disconnected }` |
//!
//! Answers are queued on the event channel and never delivered from inside
//! the call.
//!
//! ## Dependency rule
//!
//! Depends on `nanoled-app` (port traits) and `nanoled-domain` only.

mod config;
mod registers;

pub use config::VirtualConfig;
pub use registers::Registers;

use std::sync::{Mutex, MutexGuard, PoisonError};

use nanoled_app::ports::{
    GattCharacteristic, GattService, GattStatus, LinkState, ScannedPeripheral, Transport,
    TransportEvent,
};
use nanoled_app::pump::EventSender;
use nanoled_domain::protocol::{Characteristic, LED_SERVICE, ScanSettings};

/// Identifier the virtual peripheral advertises under.
pub const VIRTUAL_ID: &str = "virtual-nano";
/// Local name the virtual peripheral advertises.
pub const VIRTUAL_NAME: &str = "Nano LED (virtual)";

/// ATT error reported for requests on a dropped link.
const NOT_CONNECTED: GattStatus = GattStatus::Failure(0x85);

#[derive(Debug)]
struct Link {
    connected: bool,
    registers: Registers,
}

/// [`Transport`] backed by an in-memory LED controller.
pub struct VirtualTransport {
    config: VirtualConfig,
    events: EventSender<Characteristic>,
    link: Mutex<Link>,
}

impl VirtualTransport {
    #[must_use]
    pub fn new(config: VirtualConfig, events: EventSender<Characteristic>) -> Self {
        let registers = Registers::from(&config);
        Self {
            config,
            events,
            link: Mutex::new(Link {
                connected: false,
                registers,
            }),
        }
    }

    /// Current register values.
    #[must_use]
    pub fn registers(&self) -> Registers {
        self.lock().registers.clone()
    }

    /// Change the voltage the next battery read reports.
    pub fn set_battery_voltage(&self, volts: f32) {
        self.lock().registers.battery_voltage = volts;
    }

    /// Simulate the peripheral going out of range.
    pub fn drop_link(&self) {
        let was_connected = std::mem::replace(&mut self.lock().connected, false);
        if was_connected {
            tracing::info!("virtual link dropped");
            self.emit(TransportEvent::ConnectionStateChanged {
                status: GattStatus::Success,
                state: LinkState::Disconnected,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent<Characteristic>) {
        if self.events.send(event).is_err() {
            tracing::debug!("no pump listening to virtual transport");
        }
    }

    fn service(&self) -> GattService<Characteristic> {
        GattService {
            uuid: LED_SERVICE,
            characteristics: Characteristic::ALL
                .into_iter()
                .filter(|c| !self.config.omit_characteristics.contains(c))
                .map(|c| GattCharacteristic {
                    uuid: c.uuid(),
                    handle: c,
                })
                .collect(),
        }
    }
}

impl Transport for VirtualTransport {
    type Handle = Characteristic;

    fn is_enabled(&self) -> bool {
        self.config.adapter_enabled
    }

    fn start_scan(&self, settings: &ScanSettings) {
        tracing::debug!(service = %settings.service, "virtual scan started");
        if settings.service != LED_SERVICE {
            return;
        }
        self.emit(TransportEvent::ScanMatch(ScannedPeripheral {
            id: VIRTUAL_ID.to_owned(),
            name: Some(VIRTUAL_NAME.to_owned()),
        }));
    }

    fn stop_scan(&self) {
        tracing::debug!("virtual scan stopped");
    }

    fn connect(&self, peripheral: &ScannedPeripheral) {
        let known = peripheral.id == VIRTUAL_ID;
        self.lock().connected = known;
        let (status, state) = if known {
            (GattStatus::Success, LinkState::Connected)
        } else {
            (NOT_CONNECTED, LinkState::Disconnected)
        };
        self.emit(TransportEvent::ConnectionStateChanged { status, state });
    }

    fn discover_services(&self) {
        let event = if self.lock().connected {
            TransportEvent::ServicesDiscovered {
                status: GattStatus::Success,
                services: vec![self.service()],
            }
        } else {
            TransportEvent::ServicesDiscovered {
                status: NOT_CONNECTED,
                services: Vec::new(),
            }
        };
        self.emit(event);
    }

    fn submit_read(&self, handle: &Characteristic) {
        let (value, status) = {
            let link = self.lock();
            if link.connected {
                (link.registers.read(*handle), GattStatus::Success)
            } else {
                (Vec::new(), NOT_CONNECTED)
            }
        };
        tracing::trace!(characteristic = %handle, %status, "virtual read");
        self.emit(TransportEvent::ReadComplete {
            characteristic: handle.uuid(),
            value,
            status,
        });
    }

    fn submit_write(&self, handle: &Characteristic, payload: &[u8]) {
        let status = {
            let mut link = self.lock();
            if link.connected {
                link.registers.write(*handle, payload)
            } else {
                NOT_CONNECTED
            }
        };
        tracing::trace!(characteristic = %handle, %status, "virtual write");
        self.emit(TransportEvent::WriteComplete {
            characteristic: handle.uuid(),
            status,
        });
    }

    fn disconnect(&self) {
        self.drop_link();
    }

    fn close(&self) {
        tracing::debug!("virtual session closed");
    }
}
