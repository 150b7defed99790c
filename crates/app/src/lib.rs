//! # nanoled-app
//!
//! Application layer: the Nano connector and the **port definitions** it
//! drives.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `Transport`: scan, connect, discover, submit reads and writes
//!   - `ConnectorObserver`: receives status lines and lifecycle events
//! - Serialize GATT requests so that exactly zero or one is outstanding on the
//!   transport at any time ([`serializer`])
//! - Drive the scan → connect → discover → initialize → ready lifecycle
//!   ([`session`]) behind the public facade ([`connector`])
//! - Provide **in-process infrastructure** that needs no radio: the
//!   broadcast observer ([`event_bus`]) and the transport event pump ([`pump`])
//!
//! ## Dependency rule
//! Depends on `nanoled-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod connector;
pub mod event_bus;
mod outbox;
pub mod ports;
pub mod pump;
pub mod serializer;
pub mod session;

pub use connector::NanoConnector;
