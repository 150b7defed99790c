//! The unit of work the operation serializer manages.
//!
//! An [`Operation`] is a single GATT read or write. It is generic over the
//! transport's characteristic handle type `H` so that the domain never sees a
//! concrete BLE stack. Operations are consumed exactly once and have no value
//! equality: two reads of the same characteristic are still two operations.

use std::fmt;

use crate::codec::Decoder;
use crate::protocol::Characteristic;

/// Identifies one GATT session. A new id is minted for every `connect()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// The id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw numeric value, for logging.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read or write, without payload. Used to match completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// One GATT request, waiting in the queue or in flight.
pub enum Operation<H> {
    /// Read a characteristic and fold the value into the cache.
    Read {
        session: SessionId,
        characteristic: Characteristic,
        handle: H,
        decoder: Decoder,
    },
    /// Write `payload` to a characteristic.
    Write {
        session: SessionId,
        characteristic: Characteristic,
        handle: H,
        payload: Vec<u8>,
    },
}

impl<H> Operation<H> {
    /// A read of `characteristic` using its registered decoder.
    pub fn read(session: SessionId, characteristic: Characteristic, handle: H) -> Self {
        Self::Read {
            session,
            characteristic,
            handle,
            decoder: Decoder::for_characteristic(characteristic),
        }
    }

    /// A write of `payload` to `characteristic`.
    pub fn write(
        session: SessionId,
        characteristic: Characteristic,
        handle: H,
        payload: Vec<u8>,
    ) -> Self {
        Self::Write {
            session,
            characteristic,
            handle,
            payload,
        }
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Read { .. } => OperationKind::Read,
            Self::Write { .. } => OperationKind::Write,
        }
    }

    #[must_use]
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::Read { characteristic, .. } | Self::Write { characteristic, .. } => {
                *characteristic
            }
        }
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        match self {
            Self::Read { session, .. } | Self::Write { session, .. } => *session,
        }
    }

    /// The transport handle the request is addressed to.
    pub fn handle(&self) -> &H {
        match self {
            Self::Read { handle, .. } | Self::Write { handle, .. } => handle,
        }
    }
}

impl<H> fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Operation");
        s.field("kind", &self.kind())
            .field("session", &self.session())
            .field("characteristic", &self.characteristic());
        if let Self::Write { payload, .. } = self {
            s.field("payload", payload);
        }
        s.finish_non_exhaustive()
    }
}

impl<H> fmt::Display for Operation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { characteristic, .. } => write!(f, "read {characteristic}"),
            Self::Write {
                characteristic,
                payload,
                ..
            } => write!(f, "write {characteristic} {payload:02x?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_mint_increasing_session_ids() {
        let first = SessionId::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(first.as_u64(), 1);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn should_attach_registered_decoder_to_reads() {
        let op = Operation::read(SessionId::default(), Characteristic::StyleNames, ());
        let Operation::Read { decoder, .. } = op else {
            panic!("expected a read");
        };
        assert_eq!(decoder.characteristic(), Characteristic::StyleNames);
    }

    #[test]
    fn should_report_kind_and_characteristic() {
        let op = Operation::write(SessionId::default(), Characteristic::Speed, 7u8, vec![50]);
        assert_eq!(op.kind(), OperationKind::Write);
        assert_eq!(op.characteristic(), Characteristic::Speed);
        assert_eq!(*op.handle(), 7);
    }

    #[test]
    fn should_describe_operation_for_status_lines() {
        let read = Operation::read(SessionId::default(), Characteristic::Brightness, ());
        assert_eq!(read.to_string(), "read Brightness");
        let write = Operation::write(SessionId::default(), Characteristic::Step, (), vec![0x0a]);
        assert_eq!(write.to_string(), "write Step [0a]");
    }
}
