//! Wire contract with the Nano LED controller.
//!
//! The peripheral advertises a single primary service. Every setting lives in
//! its own characteristic, addressed by a fixed 128-bit UUID:
//!
//! | Characteristic | Access | Encoding |
//! |----------------|--------|----------|
//! | Brightness | R/W | 1 byte, `u8` |
//! | Style | R/W | 1 byte, index into the style names |
//! | Style Names | R | UTF-8, `;`-separated |
//! | Speed | R/W | 1 byte, `u8` |
//! | Step | R/W | 1 byte, `u8` |
//! | Pattern | R/W | 1 byte, index into the pattern names |
//! | Pattern Names | R | UTF-8, `;`-separated |
//! | Battery Voltage | R | 4 bytes, `f32` little-endian |

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary service UUID of the LED controller. Scans filter on it.
pub const LED_SERVICE: Uuid = Uuid::from_u128(0x99be_4fac_c708_41e5_a149_7404_7f55_4cc1);

/// GATT characteristic UUID for the brightness register.
pub const BRIGHTNESS_CHAR: Uuid = Uuid::from_u128(0x5ecc_b54e_465f_47f4_ac50_6735_bfc0_e730);

/// GATT characteristic UUID for the selected animation style.
pub const STYLE_CHAR: Uuid = Uuid::from_u128(0xc99d_b9f7_1719_43db_ad86_d02d_36b1_91b3);

/// GATT characteristic UUID for the list of style names.
pub const STYLE_NAMES_CHAR: Uuid = Uuid::from_u128(0x9022_a1e0_3a1f_428a_bad6_3181_a4d0_10a5);

/// GATT characteristic UUID for the animation speed.
pub const SPEED_CHAR: Uuid = Uuid::from_u128(0xb975_e425_62e4_4b08_a652_d64a_d509_7815);

/// GATT characteristic UUID for the animation step.
pub const STEP_CHAR: Uuid = Uuid::from_u128(0x70e5_1723_0771_4946_a5b3_4969_3e96_46b5);

/// GATT characteristic UUID for the selected pattern.
pub const PATTERN_CHAR: Uuid = Uuid::from_u128(0x6b50_3d25_f643_4823_a8a6_da51_109e_713f);

/// GATT characteristic UUID for the list of pattern names.
pub const PATTERN_NAMES_CHAR: Uuid = Uuid::from_u128(0x3481_95d1_e237_4b0b_aea4_c818_c3eb_5e2a);

/// GATT characteristic UUID for the battery voltage.
pub const BATTERY_VOLTAGE_CHAR: Uuid =
    Uuid::from_u128(0xea0a_95bc_7561_4b1e_8925_7973_b3ad_7b9a);

/// One of the eight characteristics of the LED service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    Brightness,
    Style,
    StyleNames,
    Speed,
    Step,
    Pattern,
    PatternNames,
    BatteryVoltage,
}

impl Characteristic {
    /// Every characteristic, in the order they are read during initialization.
    pub const ALL: [Self; 8] = [
        Self::Brightness,
        Self::Style,
        Self::StyleNames,
        Self::Speed,
        Self::Step,
        Self::Pattern,
        Self::PatternNames,
        Self::BatteryVoltage,
    ];

    /// The characteristic's UUID on the wire.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        match self {
            Self::Brightness => BRIGHTNESS_CHAR,
            Self::Style => STYLE_CHAR,
            Self::StyleNames => STYLE_NAMES_CHAR,
            Self::Speed => SPEED_CHAR,
            Self::Step => STEP_CHAR,
            Self::Pattern => PATTERN_CHAR,
            Self::PatternNames => PATTERN_NAMES_CHAR,
            Self::BatteryVoltage => BATTERY_VOLTAGE_CHAR,
        }
    }

    /// Look a characteristic up by UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    /// Human-readable name used in status lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Brightness => "Brightness",
            Self::Style => "Style",
            Self::StyleNames => "Style Names",
            Self::Speed => "Speed",
            Self::Step => "Step",
            Self::Pattern => "Pattern",
            Self::PatternNames => "Pattern Names",
            Self::BatteryVoltage => "Battery Voltage",
        }
    }

    /// Whether the client may write this characteristic.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Brightness | Self::Style | Self::Speed | Self::Step | Self::Pattern
        )
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters handed to the transport when a scan starts.
///
/// The scan reports the first advertisement carrying `service` and nothing
/// else; the caller stops it before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Only peripherals advertising this service are reported.
    pub service: Uuid,
}

impl ScanSettings {
    /// Settings used to find the LED controller.
    #[must_use]
    pub const fn led_controller() -> Self {
        Self {
            service: LED_SERVICE,
        }
    }
}
