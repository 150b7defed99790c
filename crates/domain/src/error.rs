//! Error types for decoding characteristic values.

use crate::protocol::Characteristic;

/// A characteristic value could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The value is shorter than the characteristic's encoding requires.
    #[error("{characteristic} value must be at least {expected} bytes, got {actual}")]
    TooShort {
        /// Which characteristic was being decoded.
        characteristic: Characteristic,
        /// Minimum byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_too_short_error() {
        let err = DecodeError::TooShort {
            characteristic: Characteristic::BatteryVoltage,
            expected: 4,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Battery Voltage value must be at least 4 bytes, got 2"
        );
    }
}
