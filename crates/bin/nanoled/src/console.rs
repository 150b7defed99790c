//! Interactive console: parses typed commands into connector calls and
//! prints observer events.

use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;

use nanoled_app::NanoConnector;
use nanoled_app::ports::{ConnectorObserver, Transport};
use nanoled_domain::connection::ConnectionState;
use nanoled_domain::event::ConnectorEvent;

use crate::config::{ConsoleConfig, OutputFormat};

pub const HELP: &str = "\
commands:
  brightness N        set brightness (0-255)
  style N|NAME        select a style by position or name
  speed N             set animation speed (0-255)
  step N              set animation step (0-255)
  pattern N|NAME      select a pattern by position or name
  voltage             read the battery voltage
  show                print the values read at connect time
  connect             scan and connect to the controller
  disconnect          drop the connection
  help                show this list
  quit                exit";

/// A level characteristic the console can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Brightness,
    Style,
    Speed,
    Step,
    Pattern,
}

impl Setting {
    /// Whether values may also be given by their advertised name.
    const fn accepts_names(self) -> bool {
        matches!(self, Self::Style | Self::Pattern)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Index(u8),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(Setting, Value),
    Voltage,
    Show,
    Connect,
    Disconnect,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, type 'help'")]
    Unknown(String),
    #[error("'{0}' needs a value")]
    MissingValue(&'static str),
    #[error("{value:?} is not a value between 0 and 255")]
    OutOfRange { value: String },
    #[error("'{command}' takes no argument")]
    UnexpectedArgument { command: &'static str },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let setting = match word.to_ascii_lowercase().as_str() {
            "brightness" => Setting::Brightness,
            "style" => Setting::Style,
            "speed" => Setting::Speed,
            "step" => Setting::Step,
            "pattern" => Setting::Pattern,
            "voltage" => return bare(Self::Voltage, "voltage", rest),
            "show" => return bare(Self::Show, "show", rest),
            "connect" => return bare(Self::Connect, "connect", rest),
            "disconnect" => return bare(Self::Disconnect, "disconnect", rest),
            "help" | "?" => return bare(Self::Help, "help", rest),
            "quit" | "exit" => return bare(Self::Quit, "quit", rest),
            _ => return Err(CommandError::Unknown(word.to_owned())),
        };
        Ok(Self::Set(setting, parse_value(setting, word_name(setting), rest)?))
    }
}

fn bare(command: Command, name: &'static str, rest: &str) -> Result<Command, CommandError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::UnexpectedArgument { command: name })
    }
}

const fn word_name(setting: Setting) -> &'static str {
    match setting {
        Setting::Brightness => "brightness",
        Setting::Style => "style",
        Setting::Speed => "speed",
        Setting::Step => "step",
        Setting::Pattern => "pattern",
    }
}

fn parse_value(setting: Setting, name: &'static str, raw: &str) -> Result<Value, CommandError> {
    if raw.is_empty() {
        return Err(CommandError::MissingValue(name));
    }
    if raw.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return raw
            .parse::<u8>()
            .map(Value::Index)
            .map_err(|_| CommandError::OutOfRange {
                value: raw.to_owned(),
            });
    }
    if setting.accepts_names() {
        Ok(Value::Name(raw.to_owned()))
    } else {
        Err(CommandError::OutOfRange {
            value: raw.to_owned(),
        })
    }
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply `command` to the connector. Returns text for the user, if any.
pub fn execute<T, O>(
    connector: &NanoConnector<T, O>,
    command: Command,
    output: OutputFormat,
) -> (Flow, Option<String>)
where
    T: Transport,
    O: ConnectorObserver,
{
    let reply = match command {
        Command::Set(setting, value) => set(connector, setting, value),
        Command::Voltage => {
            connector.refresh_voltage();
            None
        }
        Command::Show => show(connector, output),
        Command::Connect => {
            connector.connect();
            None
        }
        Command::Disconnect => {
            connector.disconnect();
            None
        }
        Command::Help => Some(HELP.to_owned()),
        Command::Quit => return (Flow::Quit, None),
    };
    (Flow::Continue, reply)
}

fn set<T, O>(connector: &NanoConnector<T, O>, setting: Setting, value: Value) -> Option<String>
where
    T: Transport,
    O: ConnectorObserver,
{
    let index = match value {
        Value::Index(index) => index,
        Value::Name(name) => {
            let found = match setting {
                Setting::Style => connector.style_index(&name),
                Setting::Pattern => connector.pattern_index(&name),
                _ => None,
            };
            match found {
                Some(index) => index,
                None => return Some(format!("no {} named {name:?}", word_name(setting))),
            }
        }
    };
    match setting {
        Setting::Brightness => connector.set_brightness(index),
        Setting::Style => {
            connector.set_style(index);
            return connector
                .style_name(index)
                .map(|name| format!("Selected item: {name}"));
        }
        Setting::Speed => connector.set_speed(index),
        Setting::Step => connector.set_step(index),
        Setting::Pattern => {
            connector.set_pattern(index);
            return connector
                .pattern_name(index)
                .map(|name| format!("Selected item: {name}"));
        }
    }
    None
}

/// What the connector knows right now.
#[derive(Debug, Serialize)]
struct Snapshot {
    state: ConnectionState,
    brightness: Option<u8>,
    style: Option<u8>,
    speed: Option<u8>,
    step: Option<u8>,
    pattern: Option<u8>,
    styles: Option<Vec<String>>,
    patterns: Option<Vec<String>>,
    battery_voltage: Option<f32>,
}

fn show<T, O>(connector: &NanoConnector<T, O>, output: OutputFormat) -> Option<String>
where
    T: Transport,
    O: ConnectorObserver,
{
    let snapshot = Snapshot {
        state: connector.state(),
        brightness: connector.initial_brightness(),
        style: connector.initial_style(),
        speed: connector.initial_speed(),
        step: connector.initial_step(),
        pattern: connector.initial_pattern(),
        styles: connector.known_styles(),
        patterns: connector.known_patterns(),
        battery_voltage: connector.last_battery_voltage(),
    };
    if output == OutputFormat::Json {
        return serde_json::to_string(&snapshot)
            .inspect_err(|err| tracing::warn!(%err, "could not serialize snapshot"))
            .ok();
    }
    let level = |v: Option<u8>| v.map_or_else(|| "-".to_owned(), |v| v.to_string());
    let names = |v: Option<&[String]>| v.map_or_else(|| "-".to_owned(), |v| v.join(", "));
    Some(format!(
        "state:      {}\nbrightness: {}\nstyle:      {} [{}]\nspeed:      {}\nstep:       {}\npattern:    {} [{}]\nbattery:    {}",
        snapshot.state,
        level(snapshot.brightness),
        level(snapshot.style),
        names(snapshot.styles.as_deref()),
        level(snapshot.speed),
        level(snapshot.step),
        level(snapshot.pattern),
        names(snapshot.patterns.as_deref()),
        snapshot
            .battery_voltage
            .map_or_else(|| "-".to_owned(), |v| format!("{v:.2} V")),
    ))
}

#[derive(Serialize)]
struct Line<'a> {
    at: DateTime<Local>,
    #[serde(flatten)]
    event: &'a ConnectorEvent,
}

/// Format one observer event, or `None` when the console hides it.
#[must_use]
pub fn render(event: &ConnectorEvent, at: DateTime<Local>, config: &ConsoleConfig) -> Option<String> {
    if !config.show_status && matches!(event, ConnectorEvent::Status { .. }) {
        return None;
    }
    match config.output {
        OutputFormat::Text => {
            let body = match event {
                ConnectorEvent::Status { message } => message.clone(),
                ConnectorEvent::Connected => "** connected **".to_owned(),
                ConnectorEvent::Disconnected => "** disconnected **".to_owned(),
                ConnectorEvent::BatteryVoltage { volts } => format!("Battery: {volts:.2} V"),
            };
            Some(format!("[{}] {body}", at.format("%H:%M:%S%.3f")))
        }
        OutputFormat::Json => match serde_json::to_string(&Line { at, event }) {
            Ok(line) => Some(line),
            Err(err) => {
                tracing::warn!(%err, "could not serialize event");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 5)
            .single()
            .unwrap()
    }

    #[test]
    fn should_parse_numeric_settings() {
        assert_eq!(
            "brightness 200".parse::<Command>(),
            Ok(Command::Set(Setting::Brightness, Value::Index(200)))
        );
        assert_eq!(
            "  Speed   7 ".parse::<Command>(),
            Ok(Command::Set(Setting::Speed, Value::Index(7)))
        );
    }

    #[test]
    fn should_parse_names_for_style_and_pattern() {
        assert_eq!(
            "style Rainbow".parse::<Command>(),
            Ok(Command::Set(Setting::Style, Value::Name("Rainbow".to_owned())))
        );
        assert_eq!(
            "pattern Slow Blink".parse::<Command>(),
            Ok(Command::Set(
                Setting::Pattern,
                Value::Name("Slow Blink".to_owned())
            ))
        );
    }

    #[test]
    fn should_reject_out_of_range_values() {
        assert_eq!(
            "brightness 256".parse::<Command>(),
            Err(CommandError::OutOfRange {
                value: "256".to_owned()
            })
        );
        assert_eq!(
            "step -1".parse::<Command>(),
            Err(CommandError::OutOfRange {
                value: "-1".to_owned()
            })
        );
        assert!(matches!(
            "speed fast".parse::<Command>(),
            Err(CommandError::OutOfRange { .. })
        ));
    }

    #[test]
    fn should_require_a_value() {
        assert_eq!(
            "brightness".parse::<Command>(),
            Err(CommandError::MissingValue("brightness"))
        );
    }

    #[test]
    fn should_parse_bare_commands() {
        assert_eq!("voltage".parse::<Command>(), Ok(Command::Voltage));
        assert_eq!("show".parse::<Command>(), Ok(Command::Show));
        assert_eq!("connect".parse::<Command>(), Ok(Command::Connect));
        assert_eq!("disconnect".parse::<Command>(), Ok(Command::Disconnect));
        assert_eq!("?".parse::<Command>(), Ok(Command::Help));
        assert_eq!("exit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!(
            "quit now".parse::<Command>(),
            Err(CommandError::UnexpectedArgument { command: "quit" })
        );
    }

    #[test]
    fn should_reject_unknown_command() {
        assert_eq!(
            "colour red".parse::<Command>(),
            Err(CommandError::Unknown("colour".to_owned()))
        );
    }

    #[test]
    fn should_render_text_with_timestamp() {
        let line = render(
            &ConnectorEvent::BatteryVoltage { volts: 3.7 },
            at(),
            &ConsoleConfig::default(),
        );
        assert_eq!(line.as_deref(), Some("[12:30:05.000] Battery: 3.70 V"));
    }

    #[test]
    fn should_hide_status_lines_when_disabled() {
        let config = ConsoleConfig {
            show_status: false,
            ..ConsoleConfig::default()
        };
        assert!(render(&ConnectorEvent::status("Scanning"), at(), &config).is_none());
        assert!(render(&ConnectorEvent::Connected, at(), &config).is_some());
    }

    #[test]
    fn should_render_json_lines() {
        let config = ConsoleConfig {
            output: OutputFormat::Json,
            ..ConsoleConfig::default()
        };
        let line = render(&ConnectorEvent::status("Found Nano"), at(), &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "status");
        assert_eq!(value["message"], "Found Nano");
        assert!(value["at"].is_string());
    }
}
