//! Console control surface.
//!
//! Stands in for the phone UI and the game controller: every line typed on
//! stdin is parsed into a [`ConsoleCommand`].  UI actions are published on the
//! [`UiEventBus`]; `pad` lines become raw controller reports.
//!
//! ```text
//! left | right | forward | up | backward | back | down | stop
//! auto on | auto off
//! speed <0-255>
//! pad [<button>...] [<trigger 0.0-1.0>]    e.g. `pad r2 dpad_up 0.8`, `pad`
//! sensor left | sensor right                (only with --simulate)
//! quit
//! ```
//!
//! A `pad` line stays in effect until the next one; a bare `pad` releases
//! everything.

use boxcar_core::{Axis, Button, SensorEvent};
use serde::de::{value::Error as ValueError, IntoDeserializer};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::application::ui_events::{UiEvent, UiEventBus};
use crate::infrastructure::input::ps4::Ps4Report;
use crate::infrastructure::input::ScriptHandle;
use crate::infrastructure::transport::SimulatorHandle;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Ui(UiEvent),
    /// New controller state.
    Pad(Ps4Report),
    /// Inject a sensor hit into the simulated vehicle.
    Sensor(SensorEvent),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseConsoleError {
    #[error("empty line")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("`{0}` expects {1}")]
    BadArgument(&'static str, &'static str),
}

impl TryFrom<&str> for ConsoleCommand {
    type Error = ParseConsoleError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let lowered = line.trim().to_ascii_lowercase();
        let mut tokens = lowered.split_whitespace();
        let cmd = tokens.next().ok_or(ParseConsoleError::Empty)?;
        let arg = tokens.next();

        let command = match cmd {
            "left" => ConsoleCommand::Ui(UiEvent::Left),
            "right" => ConsoleCommand::Ui(UiEvent::Right),
            "forward" | "up" => ConsoleCommand::Ui(UiEvent::Forward),
            "backward" | "back" | "down" => ConsoleCommand::Ui(UiEvent::Backward),
            "stop" => ConsoleCommand::Ui(UiEvent::Stop),
            "auto" => match arg {
                Some("on") => ConsoleCommand::Ui(UiEvent::AutoMode(true)),
                Some("off") => ConsoleCommand::Ui(UiEvent::AutoMode(false)),
                _ => return Err(ParseConsoleError::BadArgument("auto", "on or off")),
            },
            "speed" => {
                let speed = arg
                    .and_then(|s| s.parse::<u8>().ok())
                    .ok_or(ParseConsoleError::BadArgument("speed", "a value from 0 to 255"))?;
                ConsoleCommand::Ui(UiEvent::Speed(speed))
            }
            "pad" => ConsoleCommand::Pad(parse_pad(lowered.split_whitespace().skip(1))?),
            "sensor" => match arg {
                Some("left") => ConsoleCommand::Sensor(SensorEvent::LeftSensorTriggered),
                Some("right") => ConsoleCommand::Sensor(SensorEvent::RightSensorTriggered),
                _ => return Err(ParseConsoleError::BadArgument("sensor", "left or right")),
            },
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(ParseConsoleError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Builds a controller report from button names and an optional trigger level.
fn parse_pad<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Ps4Report, ParseConsoleError> {
    let mut report = Ps4Report::default();
    for token in tokens {
        if let Ok(level) = token.parse::<f32>() {
            if !(0.0..=1.0).contains(&level) {
                return Err(ParseConsoleError::BadArgument("pad", "a trigger level from 0.0 to 1.0"));
            }
            let raw = (level * f32::from(u16::MAX)).round() as u16;
            report = report
                .with_axis(Axis::LeftTrigger, raw)
                .with_axis(Axis::RightTrigger, raw);
            continue;
        }
        let button = Button::deserialize(IntoDeserializer::<ValueError>::into_deserializer(token))
            .map_err(|_| ParseConsoleError::Unknown(token.to_string()))?;
        report = match button {
            Button::DpadUp => report.with_pov(0),
            Button::DpadRight => report.with_pov(9000),
            Button::DpadDown => report.with_pov(18000),
            Button::DpadLeft => report.with_pov(27000),
            other => report.with_button(other),
        };
    }
    Ok(report)
}

/// Where console commands are delivered.
#[derive(Debug, Clone, Default)]
pub struct ConsoleTargets {
    pub ui: UiEventBus,
    /// Receives `pad` reports.
    pub gamepad: Option<ScriptHandle>,
    /// Receives `sensor` injections.
    pub simulator: Option<SimulatorHandle>,
}

/// Why [`run_console`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    EndOfInput,
}

/// Reads commands from `reader` until `quit` or end of input.
///
/// Parse failures are reported and skipped, as are commands whose target is
/// absent.
pub async fn run_console<R>(reader: R, targets: &ConsoleTargets) -> std::io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match ConsoleCommand::try_from(line.as_str()) {
            Ok(ConsoleCommand::Quit) => {
                info!("quit requested");
                return Ok(ConsoleExit::Quit);
            }
            Ok(ConsoleCommand::Ui(event)) => {
                let receivers = targets.ui.publish(event);
                debug!(?event, receivers, "UI event published");
            }
            Ok(ConsoleCommand::Pad(report)) => match &targets.gamepad {
                Some(pad) => pad.push_report(&report),
                None => warn!("no console gamepad attached"),
            },
            Ok(ConsoleCommand::Sensor(event)) => match &targets.simulator {
                Some(sim) => sim.trigger(event),
                None => warn!("sensor injection needs --simulate"),
            },
            Err(ParseConsoleError::Empty) => {}
            Err(e) => warn!("{e}"),
        }
    }
    Ok(ConsoleExit::EndOfInput)
}
