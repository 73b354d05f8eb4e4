//! The discrete motion state of the vehicle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::messages::Command;

/// The last acknowledged direction the vehicle was commanded to move in.
///
/// Only the protocol engine changes this value, and only after the vehicle has
/// acknowledged the matching command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Stopped,
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// The command that puts the vehicle into this direction.
    pub fn command(self) -> Command {
        match self {
            Direction::Stopped => Command::Stop,
            Direction::Forward => Command::Forward,
            Direction::Backward => Command::Backward,
            Direction::Left => Command::Left,
            Direction::Right => Command::Right,
        }
    }

    pub fn is_moving(self) -> bool {
        self != Direction::Stopped
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Stopped => "stopped",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

impl Command {
    /// The direction this command moves the vehicle into, if it is directional.
    ///
    /// `SetSpeed` does not change direction and returns `None`.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Command::Stop => Some(Direction::Stopped),
            Command::Forward => Some(Direction::Forward),
            Command::Backward => Some(Direction::Backward),
            Command::Left => Some(Direction::Left),
            Command::Right => Some(Direction::Right),
            Command::SetSpeed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_direction_is_stopped() {
        assert_eq!(Direction::default(), Direction::Stopped);
        assert!(!Direction::default().is_moving());
    }

    #[test]
    fn test_direction_and_command_map_both_ways() {
        for direction in [
            Direction::Stopped,
            Direction::Forward,
            Direction::Backward,
            Direction::Left,
            Direction::Right,
        ] {
            assert_eq!(direction.command().direction(), Some(direction));
        }
    }

    #[test]
    fn test_set_speed_has_no_direction() {
        assert_eq!(Command::SetSpeed(10).direction(), None);
    }
}
