//! # nanoled-domain
//!
//! Pure domain model for talking to the Nano LED controller peripheral.
//!
//! ## Responsibilities
//! - The wire contract: LED service UUID, the eight characteristic UUIDs and
//!   their value encodings ([`protocol`], [`codec`])
//! - The values cached while a session initializes ([`state`])
//! - The unit of work the serializer manages ([`operation`])
//! - Connection lifecycle states ([`connection`]) and the events reported to
//!   an observer ([`event`])
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or BLE stacks.
//! Transport boundaries are expressed as traits in the `app` crate (ports).

pub mod codec;
pub mod connection;
pub mod error;
pub mod event;
pub mod operation;
pub mod protocol;
pub mod state;
