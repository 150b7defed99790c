//! The virtual LED controller's characteristic values.

use nanoled_app::ports::GattStatus;
use nanoled_domain::codec::NAME_SEPARATOR;
use nanoled_domain::protocol::Characteristic;

use crate::config::VirtualConfig;

/// ATT error: write not permitted.
const WRITE_NOT_PERMITTED: GattStatus = GattStatus::Failure(0x03);
/// ATT error: invalid attribute value length.
const INVALID_LENGTH: GattStatus = GattStatus::Failure(0x0d);

/// Register file of the simulated peripheral.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    pub brightness: u8,
    pub style: u8,
    pub speed: u8,
    pub step: u8,
    pub pattern: u8,
    pub style_names: Vec<String>,
    pub pattern_names: Vec<String>,
    pub battery_voltage: f32,
}

impl From<&VirtualConfig> for Registers {
    fn from(config: &VirtualConfig) -> Self {
        Self {
            brightness: config.brightness,
            style: config.style,
            speed: config.speed,
            step: config.step,
            pattern: config.pattern,
            style_names: config.style_names.clone(),
            pattern_names: config.pattern_names.clone(),
            battery_voltage: config.battery_voltage,
        }
    }
}

impl Registers {
    /// Raw value as the firmware would return it.
    #[must_use]
    pub fn read(&self, characteristic: Characteristic) -> Vec<u8> {
        match characteristic {
            Characteristic::StyleNames => join(&self.style_names),
            Characteristic::PatternNames => join(&self.pattern_names),
            Characteristic::BatteryVoltage => self.battery_voltage.to_le_bytes().to_vec(),
            level => self.level(level).map_or_else(Vec::new, |v| vec![v]),
        }
    }

    /// Store the first byte of `payload` in a writable register.
    pub fn write(&mut self, characteristic: Characteristic, payload: &[u8]) -> GattStatus {
        if !characteristic.is_writable() {
            return WRITE_NOT_PERMITTED;
        }
        let Some(&value) = payload.first() else {
            return INVALID_LENGTH;
        };
        match self.level_mut(characteristic) {
            Some(slot) => {
                *slot = value;
                GattStatus::Success
            }
            None => WRITE_NOT_PERMITTED,
        }
    }

    fn level(&self, characteristic: Characteristic) -> Option<u8> {
        match characteristic {
            Characteristic::Brightness => Some(self.brightness),
            Characteristic::Style => Some(self.style),
            Characteristic::Speed => Some(self.speed),
            Characteristic::Step => Some(self.step),
            Characteristic::Pattern => Some(self.pattern),
            Characteristic::StyleNames
            | Characteristic::PatternNames
            | Characteristic::BatteryVoltage => None,
        }
    }

    fn level_mut(&mut self, characteristic: Characteristic) -> Option<&mut u8> {
        match characteristic {
            Characteristic::Brightness => Some(&mut self.brightness),
            Characteristic::Style => Some(&mut self.style),
            Characteristic::Speed => Some(&mut self.speed),
            Characteristic::Step => Some(&mut self.step),
            Characteristic::Pattern => Some(&mut self.pattern),
            Characteristic::StyleNames
            | Characteristic::PatternNames
            | Characteristic::BatteryVoltage => None,
        }
    }
}

fn join(names: &[String]) -> Vec<u8> {
    names.join(&NAME_SEPARATOR.to_string()).into_bytes()
}
