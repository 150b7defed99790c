//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the connector and the outside world.
//! They are defined here (in `app`) so that both the connector and the
//! adapter crates can depend on them without creating circular dependencies.

pub mod observer;
pub mod transport;

pub use observer::ConnectorObserver;
pub use transport::{
    GattCharacteristic, GattService, GattStatus, LinkState, ScannedPeripheral, Transport,
    TransportEvent,
};
