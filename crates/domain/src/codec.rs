//! Characteristic value codecs and the read-decoder registry.
//!
//! Pure functions operating on raw `&[u8]` slices. A [`Decoder`] pairs a
//! characteristic with the function that folds its raw value into
//! [`CachedState`]; the serializer only ever calls [`Decoder::decode`] and
//! stays ignorant of what the bytes mean.

use std::fmt;

use crate::error::DecodeError;
use crate::protocol::Characteristic;
use crate::state::CachedState;

const LEVEL_LEN: usize = 1;
const VOLTAGE_LEN: usize = 4;

/// Separator between entries of a names blob.
pub const NAME_SEPARATOR: char = ';';

/// What a successful decode changed in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// One of the five single-byte settings.
    Level {
        characteristic: Characteristic,
        value: u8,
    },
    /// The style or pattern name list.
    Names {
        characteristic: Characteristic,
        names: Vec<String>,
    },
    /// A fresh battery reading, in volts.
    BatteryVoltage(f32),
}

impl fmt::Display for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level {
                characteristic,
                value,
            } => write!(f, "{characteristic}: {value}"),
            Self::Names {
                characteristic,
                names,
            } => write!(f, "{characteristic}: {}", names.join(";")),
            Self::BatteryVoltage(volts) => write!(f, "Battery Voltage: {volts}"),
        }
    }
}

type ApplyFn = fn(Characteristic, &[u8], &mut CachedState) -> Result<StateUpdate, DecodeError>;

/// Turns the raw value of one characteristic into a [`CachedState`] mutation.
#[derive(Clone, Copy)]
pub struct Decoder {
    characteristic: Characteristic,
    apply: ApplyFn,
}

impl Decoder {
    /// The decoder registered for `characteristic`.
    #[must_use]
    pub fn for_characteristic(characteristic: Characteristic) -> Self {
        let apply: ApplyFn = match characteristic {
            Characteristic::Brightness
            | Characteristic::Style
            | Characteristic::Speed
            | Characteristic::Step
            | Characteristic::Pattern => apply_level,
            Characteristic::StyleNames | Characteristic::PatternNames => apply_names,
            Characteristic::BatteryVoltage => apply_voltage,
        };
        Self {
            characteristic,
            apply,
        }
    }

    /// The characteristic this decoder understands.
    #[must_use]
    pub fn characteristic(&self) -> Characteristic {
        self.characteristic
    }

    /// Decode `raw` and store the result in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooShort`] when `raw` is shorter than the
    /// encoding requires. `state` is left untouched in that case.
    pub fn decode(&self, raw: &[u8], state: &mut CachedState) -> Result<StateUpdate, DecodeError> {
        (self.apply)(self.characteristic, raw, state)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("characteristic", &self.characteristic)
            .finish_non_exhaustive()
    }
}

fn apply_level(
    characteristic: Characteristic,
    raw: &[u8],
    state: &mut CachedState,
) -> Result<StateUpdate, DecodeError> {
    let value = decode_level(characteristic, raw)?;
    if let Some(slot) = state.level_mut(characteristic) {
        *slot = Some(value);
    }
    Ok(StateUpdate::Level {
        characteristic,
        value,
    })
}

#[allow(clippy::unnecessary_wraps)] // must match `ApplyFn`
fn apply_names(
    characteristic: Characteristic,
    raw: &[u8],
    state: &mut CachedState,
) -> Result<StateUpdate, DecodeError> {
    let names = decode_names(raw);
    if let Some(slot) = state.names_mut(characteristic) {
        *slot = Some(names.clone());
    }
    Ok(StateUpdate::Names {
        characteristic,
        names,
    })
}

fn apply_voltage(
    _characteristic: Characteristic,
    raw: &[u8],
    state: &mut CachedState,
) -> Result<StateUpdate, DecodeError> {
    let volts = decode_voltage(raw)?;
    state.battery_voltage = Some(volts);
    Ok(StateUpdate::BatteryVoltage(volts))
}

/// Decode a single-byte setting. Only the first byte is significant.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] when `raw` is empty.
pub fn decode_level(characteristic: Characteristic, raw: &[u8]) -> Result<u8, DecodeError> {
    raw.first().copied().ok_or(DecodeError::TooShort {
        characteristic,
        expected: LEVEL_LEN,
        actual: 0,
    })
}

/// Encode a single-byte setting for a write.
#[must_use]
pub fn encode_level(value: u8) -> Vec<u8> {
    vec![value]
}

/// Split a names blob on `;`, keeping empty segments.
///
/// Invalid UTF-8 is replaced rather than rejected. An empty blob yields a
/// single empty name.
#[must_use]
pub fn decode_names(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split(NAME_SEPARATOR)
        .map(str::to_owned)
        .collect()
}

/// Decode the battery voltage: an IEEE-754 `f32`, little-endian.
///
/// | Bytes | Type | Field |
/// |-------|------|-------|
/// | 0–3 | f32 LE | Voltage in volts |
///
/// Trailing bytes are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] when fewer than 4 bytes are present.
pub fn decode_voltage(raw: &[u8]) -> Result<f32, DecodeError> {
    let bytes: [u8; VOLTAGE_LEN] = raw
        .get(..VOLTAGE_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::TooShort {
            characteristic: Characteristic::BatteryVoltage,
            expected: VOLTAGE_LEN,
            actual: raw.len(),
        })?;
    Ok(f32::from_le_bytes(bytes))
}
