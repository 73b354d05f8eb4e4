//! Controller input model.
//!
//! This module describes a game controller in platform-independent terms:
//! which logical buttons exist, which analog axes exist, and how raw device
//! values are normalised.  Capturing input from an actual device is the job of
//! an `InputSource` implementation in the controller crate; those adapters use
//! the types here so every drive state sees the same model.
//!
//! # Edge detection (for beginners)
//!
//! Drive states run every 10 ms.  If a state asked "is Cross pressed?" to
//! decide whether to toggle autonomous mode, a button held for half a second
//! would toggle the mode fifty times.  [`ButtonStates`] therefore keeps two
//! snapshots per button, the level at this poll and at the previous poll, and
//! answers "did Cross *go down* between the two?".  That is true for exactly one
//! poll per physical press, no matter how long the button is held.

pub mod normalize;
pub mod state;

use serde::{Deserialize, Serialize};

pub use normalize::{normalize_stick, normalize_trigger, DEFAULT_DEAD_ZONE};
pub use state::{AxisValues, ButtonStates, DpadHat};

/// Every logical button on a PS4-style controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    Share,
    Options,
    Ps,
    L3,
    R3,
    TouchPad,
    DpadLeft,
    DpadRight,
    DpadUp,
    DpadDown,
}

impl Button {
    /// All buttons, in index order.
    pub const ALL: [Button; 18] = [
        Button::Cross,
        Button::Circle,
        Button::Square,
        Button::Triangle,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::Share,
        Button::Options,
        Button::Ps,
        Button::L3,
        Button::R3,
        Button::TouchPad,
        Button::DpadLeft,
        Button::DpadRight,
        Button::DpadUp,
        Button::DpadDown,
    ];

    /// Stable index of this button into per-button arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Every analog axis on a PS4-style controller.
///
/// Sticks report `[-1, 1]` (up and right are positive), triggers `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl Axis {
    pub const ALL: [Axis; 6] = [
        Axis::LeftStickX,
        Axis::LeftStickY,
        Axis::RightStickX,
        Axis::RightStickY,
        Axis::LeftTrigger,
        Axis::RightTrigger,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// `true` for the two analog triggers, whose range is `[0, 1]`.
    pub fn is_trigger(self) -> bool {
        matches!(self, Axis::LeftTrigger | Axis::RightTrigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_indices_are_dense() {
        for (i, button) in Button::ALL.iter().enumerate() {
            assert_eq!(button.index(), i);
        }
    }

    #[test]
    fn test_axis_indices_are_dense() {
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }

    #[test]
    fn test_only_triggers_are_unipolar() {
        assert!(Axis::RightTrigger.is_trigger());
        assert!(Axis::LeftTrigger.is_trigger());
        assert!(!Axis::LeftStickX.is_trigger());
    }
}
