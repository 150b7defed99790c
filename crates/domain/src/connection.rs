//! Connection lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where a connector is in the scan → connect → discover → initialize
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing started yet.
    Idle,
    /// Waiting for the first advertisement of the LED service.
    Scanning,
    /// GATT connection requested.
    Connecting,
    /// Connected, service discovery requested.
    Discovering,
    /// Handles located, initialization reads in flight.
    Initializing,
    /// Every required value read; writes flow freely.
    Ready,
    /// Session torn down. `connect()` starts a fresh one.
    Disconnected,
}

impl ConnectionState {
    /// Whether a GATT session (possibly still being set up) exists.
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(
            self,
            Self::Scanning
                | Self::Connecting
                | Self::Discovering
                | Self::Initializing
                | Self::Ready
        )
    }

    /// Whether characteristic handles are available.
    #[must_use]
    pub const fn has_handles(self) -> bool {
        matches!(self, Self::Initializing | Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Discovering => "discovering",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_lowercase_names() {
        assert_eq!(ConnectionState::Initializing.to_string(), "initializing");
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
    }

    #[test]
    fn should_have_no_session_when_idle_or_disconnected() {
        assert!(!ConnectionState::Idle.has_session());
        assert!(!ConnectionState::Disconnected.has_session());
        assert!(ConnectionState::Scanning.has_session());
        assert!(ConnectionState::Ready.has_session());
    }

    #[test]
    fn should_only_have_handles_after_discovery() {
        assert!(!ConnectionState::Discovering.has_handles());
        assert!(ConnectionState::Initializing.has_handles());
        assert!(ConnectionState::Ready.has_handles());
    }
}
