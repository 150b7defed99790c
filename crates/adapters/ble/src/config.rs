//! BLE transport configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the btleplug transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Which host adapter to use, in the order the platform lists them.
    pub adapter_index: usize,
    /// Give up scanning after this many seconds. `0` scans until stopped.
    pub scan_timeout_secs: u16,
    /// Upper bound on a GATT connection attempt, in seconds.
    pub connect_timeout_secs: u16,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            scan_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl BleConfig {
    /// `None` when scanning is unbounded.
    #[must_use]
    pub fn scan_timeout(&self) -> Option<Duration> {
        (self.scan_timeout_secs > 0).then(|| Duration::from_secs(u64::from(self.scan_timeout_secs)))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_first_adapter() {
        let config = BleConfig::default();
        assert_eq!(config.adapter_index, 0);
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        let config: BleConfig = toml::from_str("adapter_index = 1").unwrap();
        assert_eq!(config.adapter_index, 1);
        assert_eq!(config.scan_timeout_secs, 30);
    }

    #[test]
    fn should_disable_scan_timeout_with_zero() {
        let config: BleConfig = toml::from_str("scan_timeout_secs = 0").unwrap();
        assert_eq!(config.scan_timeout(), None);
    }
}
