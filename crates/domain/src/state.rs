//! Values read from the peripheral while a session initializes.

use crate::protocol::Characteristic;

/// Snapshot of the peripheral's settings as read during initialization.
///
/// Every field is `None` until its first successful read. A failed read
/// leaves the field absent; nothing is ever defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedState {
    pub brightness: Option<u8>,
    pub style: Option<u8>,
    pub speed: Option<u8>,
    pub step: Option<u8>,
    pub pattern: Option<u8>,
    pub known_styles: Option<Vec<String>>,
    pub known_patterns: Option<Vec<String>>,
    /// Updated on every successful voltage read, not only the first.
    pub battery_voltage: Option<f32>,
}

impl CachedState {
    /// The single-byte value cached for `characteristic`, if it is one of the
    /// five `u8` settings and has been read.
    #[must_use]
    pub fn level(&self, characteristic: Characteristic) -> Option<u8> {
        match characteristic {
            Characteristic::Brightness => self.brightness,
            Characteristic::Style => self.style,
            Characteristic::Speed => self.speed,
            Characteristic::Step => self.step,
            Characteristic::Pattern => self.pattern,
            Characteristic::StyleNames
            | Characteristic::PatternNames
            | Characteristic::BatteryVoltage => None,
        }
    }

    /// Mutable slot for one of the five `u8` settings.
    pub(crate) fn level_mut(&mut self, characteristic: Characteristic) -> Option<&mut Option<u8>> {
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

    /// Mutable slot for one of the two name lists.
    pub(crate) fn names_mut(
        &mut self,
        characteristic: Characteristic,
    ) -> Option<&mut Option<Vec<String>>> {
        match characteristic {
            Characteristic::StyleNames => Some(&mut self.known_styles),
            Characteristic::PatternNames => Some(&mut self.known_patterns),
            _ => None,
        }
    }

    /// Characteristics whose values must be present before the session may
    /// be reported as ready, and are not.
    ///
    /// Battery voltage is not required.
    #[must_use]
    pub fn missing(&self) -> Vec<Characteristic> {
        let mut missing: Vec<Characteristic> = [
            Characteristic::Brightness,
            Characteristic::Style,
            Characteristic::Speed,
            Characteristic::Step,
            Characteristic::Pattern,
        ]
        .into_iter()
        .filter(|c| self.level(*c).is_none())
        .collect();

        if self.known_styles.is_none() {
            missing.push(Characteristic::StyleNames);
        }
        if self.known_patterns.is_none() {
            missing.push(Characteristic::PatternNames);
        }
        missing
    }

    /// `true` once every required value has been read.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Name of the style at `index`, if the list has been read and is long
    /// enough.
    #[must_use]
    pub fn style_name(&self, index: u8) -> Option<&str> {
        lookup(self.known_styles.as_deref(), index)
    }

    /// Name of the pattern at `index`.
    #[must_use]
    pub fn pattern_name(&self, index: u8) -> Option<&str> {
        lookup(self.known_patterns.as_deref(), index)
    }

    /// Position of `name` in the style list (case-insensitive).
    #[must_use]
    pub fn style_index(&self, name: &str) -> Option<u8> {
        position(self.known_styles.as_deref(), name)
    }

    /// Position of `name` in the pattern list (case-insensitive).
    #[must_use]
    pub fn pattern_index(&self, name: &str) -> Option<u8> {
        position(self.known_patterns.as_deref(), name)
    }
}

fn lookup(names: Option<&[String]>, index: u8) -> Option<&str> {
    names?.get(usize::from(index)).map(String::as_str)
}

fn position(names: Option<&[String]>, name: &str) -> Option<u8> {
    let index = names?.iter().position(|n| n.eq_ignore_ascii_case(name))?;
    u8::try_from(index).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_state() -> CachedState {
        CachedState {
            brightness: Some(128),
            style: Some(2),
            speed: Some(16),
            step: Some(4),
            pattern: Some(1),
            known_styles: Some(vec!["Red".into(), "Blue".into(), "Green".into()]),
            known_patterns: Some(vec!["Solid".into(), "Blink".into()]),
            battery_voltage: None,
        }
    }

    #[test]
    fn should_start_with_everything_absent() {
        let state = CachedState::default();
        assert_eq!(state.brightness, None);
        assert_eq!(state.known_styles, None);
        assert_eq!(state.battery_voltage, None);
        assert!(!state.is_complete());
    }

    #[test]
    fn should_list_all_required_values_when_empty() {
        let state = CachedState::default();
        assert_eq!(
            state.missing(),
            vec![
                Characteristic::Brightness,
                Characteristic::Style,
                Characteristic::Speed,
                Characteristic::Step,
                Characteristic::Pattern,
                Characteristic::StyleNames,
                Characteristic::PatternNames,
            ]
        );
    }

    #[test]
    fn should_be_complete_without_battery_voltage() {
        assert!(complete_state().is_complete());
    }

    #[test]
    fn should_report_single_missing_value() {
        let mut state = complete_state();
        state.step = None;
        assert_eq!(state.missing(), vec![Characteristic::Step]);
    }

    #[test]
    fn should_treat_empty_name_list_as_present() {
        let mut state = complete_state();
        state.known_patterns = Some(Vec::new());
        assert!(state.is_complete());
    }

    #[test]
    fn should_return_level_only_for_single_byte_settings() {
        let state = complete_state();
        assert_eq!(state.level(Characteristic::Speed), Some(16));
        assert_eq!(state.level(Characteristic::StyleNames), None);
        assert_eq!(state.level(Characteristic::BatteryVoltage), None);
    }

    #[test]
    fn should_look_up_names_by_index() {
        let state = complete_state();
        assert_eq!(state.style_name(1), Some("Blue"));
        assert_eq!(state.pattern_name(0), Some("Solid"));
        assert_eq!(state.style_name(3), None);
        assert_eq!(CachedState::default().style_name(0), None);
    }

    #[test]
    fn should_find_index_by_name_ignoring_case() {
        let state = complete_state();
        assert_eq!(state.style_index("green"), Some(2));
        assert_eq!(state.pattern_index("BLINK"), Some(1));
        assert_eq!(state.pattern_index("Strobe"), None);
    }
}
