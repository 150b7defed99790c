//! Operation serializer: one FIFO queue and one pending slot.
//!
//! The BLE stack silently drops or fails a GATT request submitted while
//! another is outstanding. [`OperationQueue`] guarantees that at most one
//! [`Operation`] has been handed to the [`Transport`] without its completion
//! having come back:
//!
//! - `pending == None` ⇒ nothing is outstanding on the transport.
//! - `pending == Some(op)` ⇒ the transport received exactly `op` and has not
//!   reported its completion yet.
//!
//! Completion always clears `pending` before the next operation is
//! dispatched, including when the completion does not match what was
//! pending, so a confused transport can never deadlock the queue.

use std::collections::VecDeque;

use nanoled_domain::event::ConnectorEvent;
use nanoled_domain::operation::{Operation, OperationKind};
use nanoled_domain::protocol::Characteristic;
use nanoled_domain::state::CachedState;
use uuid::Uuid;

use crate::ports::{GattStatus, Transport};

/// What [`OperationQueue::dispatch_next`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// An operation is already in flight; nothing submitted.
    Busy,
    /// The head of the queue was submitted.
    Submitted,
    /// Nothing pending and nothing queued.
    Idle,
}

/// A completion reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub kind: OperationKind,
    pub characteristic: Uuid,
    pub status: GattStatus,
    /// Value returned by a read; empty for writes.
    pub value: Vec<u8>,
}

/// FIFO of operations plus the single in-flight slot.
#[derive(Debug)]
pub struct OperationQueue<H> {
    queue: VecDeque<Operation<H>>,
    pending: Option<Operation<H>>,
}

impl<H> Default for OperationQueue<H> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            pending: None,
        }
    }
}

impl<H> OperationQueue<H> {
    /// The operation currently owned by the transport.
    pub fn pending(&self) -> Option<&Operation<H>> {
        self.pending.as_ref()
    }

    /// Number of operations waiting behind the pending one.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// `true` when nothing is pending and nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.queue.is_empty()
    }

    /// Drop everything, including the pending operation, without running any
    /// decoder. Returns how many operations were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len() + usize::from(self.pending.is_some());
        self.queue.clear();
        self.pending = None;
        dropped
    }

    /// Append `op` and submit it right away if the slot is free.
    pub fn enqueue<T>(
        &mut self,
        op: Operation<H>,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) -> Dispatch
    where
        T: Transport<Handle = H>,
    {
        tracing::trace!(operation = %op, queued = self.queue.len(), "operation enqueued");
        self.queue.push_back(op);
        self.dispatch_next(transport, events)
    }

    /// Submit the head of the queue if nothing is in flight.
    pub fn dispatch_next<T>(&mut self, transport: &T, events: &mut Vec<ConnectorEvent>) -> Dispatch
    where
        T: Transport<Handle = H>,
    {
        if self.pending.is_some() {
            return Dispatch::Busy;
        }
        let Some(op) = self.queue.pop_front() else {
            return Dispatch::Idle;
        };

        tracing::debug!(session = %op.session(), operation = %op, "submitting operation");
        events.push(ConnectorEvent::status(format!("Starting {op}")));

        let op = self.pending.insert(op);
        match op {
            Operation::Read { handle, .. } => transport.submit_read(handle),
            Operation::Write {
                handle, payload, ..
            } => transport.submit_write(handle, payload),
        }
        Dispatch::Submitted
    }

    /// Settle the pending operation with `completion`, then dispatch the next.
    ///
    /// - Mismatched kind or characteristic: `ERROR:` status, the pending
    ///   operation is dropped unsettled.
    /// - Non-success status or undecodable value: status line, the cached
    ///   value stays as it was. No retry.
    /// - Successful read: the decoder folds the value into `cache`; a battery
    ///   reading is also reported as [`ConnectorEvent::BatteryVoltage`].
    pub fn on_completion<T>(
        &mut self,
        completion: Completion,
        cache: &mut CachedState,
        transport: &T,
        events: &mut Vec<ConnectorEvent>,
    ) -> Dispatch
    where
        T: Transport<Handle = H>,
    {
        let Some(op) = self.pending.take() else {
            tracing::error!(kind = %completion.kind, characteristic = %completion.characteristic, "completion with nothing pending");
            events.push(ConnectorEvent::status(format!(
                "ERROR: {} completion for {} with no pending operation",
                completion.kind,
                name_of(completion.characteristic)
            )));
            return self.dispatch_next(transport, events);
        };

        if op.kind() != completion.kind || op.characteristic().uuid() != completion.characteristic
        {
            tracing::error!(pending = %op, kind = %completion.kind, characteristic = %completion.characteristic, "completion does not match pending operation");
            events.push(ConnectorEvent::status(format!(
                "ERROR: {} completion for {} while '{op}' was pending",
                completion.kind,
                name_of(completion.characteristic)
            )));
            return self.dispatch_next(transport, events);
        }

        if !completion.status.is_success() {
            tracing::warn!(operation = %op, status = %completion.status, "operation failed");
            events.push(ConnectorEvent::status(format!(
                "'{op}' failed with status {}",
                completion.status
            )));
            return self.dispatch_next(transport, events);
        }

        match op {
            Operation::Read { decoder, .. } => match decoder.decode(&completion.value, cache) {
                Ok(update) => {
                    tracing::debug!(%update, "read complete");
                    events.push(ConnectorEvent::status(format!("Read {update}")));
                    if let nanoled_domain::codec::StateUpdate::BatteryVoltage(volts) = update {
                        events.push(ConnectorEvent::BatteryVoltage { volts });
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "could not decode read value");
                    events.push(ConnectorEvent::status(format!(
                        "Could not decode {}: {err}",
                        decoder.characteristic()
                    )));
                }
            },
            Operation::Write { characteristic, .. } => {
                tracing::debug!(%characteristic, "write complete");
                events.push(ConnectorEvent::status(format!("Wrote {characteristic}")));
            }
        }

        self.dispatch_next(transport, events)
    }
}

/// Label of a known characteristic, the raw UUID otherwise.
fn name_of(uuid: Uuid) -> String {
    Characteristic::from_uuid(uuid).map_or_else(|| uuid.to_string(), |c| c.label().to_owned())
}
