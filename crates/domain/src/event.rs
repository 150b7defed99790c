//! Events reported to the connector's observer.

use serde::Serialize;

/// One notification for the user interface.
///
/// Delivered in the order the connector produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectorEvent {
    /// Free-form log line.
    Status { message: String },
    /// Initialization finished; cached values are valid. Once per session.
    Connected,
    /// The session ended. Once per session.
    Disconnected,
    /// A battery voltage read completed.
    BatteryVoltage { volts: f32 },
}

impl ConnectorEvent {
    /// Shorthand for a [`ConnectorEvent::Status`].
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }
}
