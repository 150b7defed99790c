//! BLE adapter error types.

/// Errors specific to the BLE adapter.
///
/// These never reach the connector's observer as values: the worker turns
/// them into failure events and the connector reports them as status lines.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// A btleplug call failed.
    #[error("BLE stack error: {0}")]
    Btleplug(#[from] btleplug::Error),

    /// A GATT request was made with no connected peripheral.
    #[error("not connected to a peripheral")]
    NotConnected,

    /// The scanned peripheral is no longer known to the adapter.
    #[error("peripheral {id} not found")]
    PeripheralNotFound { id: String },

    /// Nothing advertised the service before the deadline.
    #[error("no LED controller found within {secs} s")]
    ScanTimeout { secs: u64 },

    /// The adapter's event stream closed while scanning.
    #[error("scan ended without a match")]
    ScanEnded,

    /// The GATT connection did not complete before the deadline.
    #[error("connection timed out after {secs} s")]
    ConnectTimeout { secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_available_error() {
        let err = BleError::NotAvailable;
        assert_eq!(err.to_string(), "no BLE adapter available");
    }

    #[test]
    fn should_include_source_in_btleplug_error() {
        let err = BleError::Btleplug(btleplug::Error::DeviceNotFound);
        assert!(err.to_string().starts_with("BLE stack error: "));
    }

    #[test]
    fn should_display_scan_timeout() {
        let err = BleError::ScanTimeout { secs: 30 };
        assert_eq!(err.to_string(), "no LED controller found within 30 s");
    }

    #[test]
    fn should_display_missing_peripheral() {
        let err = BleError::PeripheralNotFound {
            id: "hci0/dev_C0_FF_EE".to_owned(),
        };
        assert_eq!(err.to_string(), "peripheral hci0/dev_C0_FF_EE not found");
    }
}
