//! Transport port: the BLE stack as the connector sees it.
//!
//! Every request is fire-and-forget. Results come back as [`TransportEvent`]s
//! which the transport publishes on a channel drained by
//! [`crate::pump::run`]; that single consumer is the logical callback thread
//! on which the connector's state changes.
//!
//! ## Contract
//!
//! - Events for one session are delivered in submission order.
//! - A transport **must not** deliver an event from inside one of its own
//!   methods (no synchronous call back into the connector): it queues the
//!   event and returns.
//! - The connector never submits a read or write before the previous one has
//!   completed; transports may rely on this.

use std::fmt;
use std::sync::Arc;

use nanoled_domain::protocol::ScanSettings;
use uuid::Uuid;

/// A peripheral reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPeripheral {
    /// Stack-specific identifier (MAC address, platform UUID, …).
    pub id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
}

impl ScannedPeripheral {
    /// The advertised name, or the id when the peripheral has none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Outcome code attached to GATT callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    /// Stack-specific failure code (e.g. `133` for the generic GATT error).
    Failure(i32),
}

impl GattStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(code) => write!(f, "error {code}"),
        }
    }
}

/// Link-layer connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// A characteristic located during service discovery.
#[derive(Debug, Clone)]
pub struct GattCharacteristic<H> {
    pub uuid: Uuid,
    /// Opaque handle, valid for the lifetime of the session.
    pub handle: H,
}

/// A primary service and its characteristics.
#[derive(Debug, Clone)]
pub struct GattService<H> {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic<H>>,
}

impl<H> GattService<H> {
    /// Find the handle of the characteristic with the given UUID.
    pub fn find_characteristic(&self, uuid: Uuid) -> Option<&H> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .map(|c| &c.handle)
    }
}

/// Something the transport reports back.
#[derive(Debug, Clone)]
pub enum TransportEvent<H> {
    /// First advertisement matching the scan filter.
    ScanMatch(ScannedPeripheral),
    /// The scan could not run or gave up.
    ScanFailed { reason: String },
    /// The GATT link changed state.
    ConnectionStateChanged { status: GattStatus, state: LinkState },
    /// Result of [`Transport::discover_services`].
    ServicesDiscovered {
        status: GattStatus,
        services: Vec<GattService<H>>,
    },
    /// A submitted read finished.
    ReadComplete {
        characteristic: Uuid,
        value: Vec<u8>,
        status: GattStatus,
    },
    /// A submitted write finished.
    WriteComplete {
        characteristic: Uuid,
        status: GattStatus,
    },
}

/// Thin contract over a platform BLE stack.
///
/// Implementations live in adapter crates (e.g. `adapter_ble`,
/// `adapter_virtual`). All methods return immediately.
pub trait Transport: Send + Sync {
    /// Characteristic handle produced by service discovery.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Whether the local adapter is powered and usable.
    fn is_enabled(&self) -> bool;

    /// Begin scanning. Reports at most one [`TransportEvent::ScanMatch`].
    fn start_scan(&self, settings: &ScanSettings);

    /// Stop a running scan. Idempotent.
    fn stop_scan(&self);

    /// Open a GATT connection to a scanned peripheral.
    fn connect(&self, peripheral: &ScannedPeripheral);

    /// Discover services on the connected peripheral.
    fn discover_services(&self);

    /// Submit a read; completes with [`TransportEvent::ReadComplete`].
    fn submit_read(&self, handle: &Self::Handle);

    /// Submit a write; completes with [`TransportEvent::WriteComplete`].
    fn submit_write(&self, handle: &Self::Handle, payload: &[u8]);

    /// Drop the link. Idempotent.
    fn disconnect(&self);

    /// Release the session's resources. Idempotent.
    fn close(&self);
}

impl<T: Transport> Transport for Arc<T> {
    type Handle = T::Handle;

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn start_scan(&self, settings: &ScanSettings) {
        (**self).start_scan(settings);
    }

    fn stop_scan(&self) {
        (**self).stop_scan();
    }

    fn connect(&self, peripheral: &ScannedPeripheral) {
        (**self).connect(peripheral);
    }

    fn discover_services(&self) {
        (**self).discover_services();
    }

    fn submit_read(&self, handle: &Self::Handle) {
        (**self).submit_read(handle);
    }

    fn submit_write(&self, handle: &Self::Handle, payload: &[u8]) {
        (**self).submit_write(handle, payload);
    }

    fn disconnect(&self) {
        (**self).disconnect();
    }

    fn close(&self) {
        (**self).close();
    }
}
