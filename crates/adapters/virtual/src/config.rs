//! Virtual peripheral configuration.

use serde::Deserialize;

use nanoled_domain::protocol::Characteristic;

/// Initial register values and fault injection for the virtual peripheral.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    pub brightness: u8,
    pub style: u8,
    pub speed: u8,
    pub step: u8,
    pub pattern: u8,
    pub style_names: Vec<String>,
    pub pattern_names: Vec<String>,
    /// Volts reported by the battery characteristic.
    pub battery_voltage: f32,
    /// `false` simulates a powered-off host adapter.
    pub adapter_enabled: bool,
    /// Characteristics left out of service discovery, to simulate older
    /// firmware.
    pub omit_characteristics: Vec<Characteristic>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            brightness: 128,
            style: 0,
            speed: 16,
            step: 4,
            pattern: 0,
            style_names: vec!["Solid".into(), "Rainbow".into(), "Chase".into()],
            pattern_names: vec!["Steady".into(), "Blink".into()],
            battery_voltage: 3.7,
            adapter_enabled: true,
            omit_characteristics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_omitted_characteristics_by_name() {
        let config: VirtualConfig =
            toml::from_str(r#"omit_characteristics = ["pattern_names", "battery_voltage"]"#)
                .unwrap();
        assert_eq!(
            config.omit_characteristics,
            vec![Characteristic::PatternNames, Characteristic::BatteryVoltage]
        );
        assert_eq!(config.brightness, 128);
    }

    #[test]
    fn should_reject_unknown_characteristic() {
        let result: Result<VirtualConfig, _> =
            toml::from_str(r#"omit_characteristics = ["colour"]"#);
        assert!(result.is_err());
    }
}
