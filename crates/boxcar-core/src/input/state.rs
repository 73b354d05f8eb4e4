//! Per-poll button and axis snapshots.

use super::{Axis, Button};

const BUTTON_COUNT: usize = Button::ALL.len();
const AXIS_COUNT: usize = Axis::ALL.len();

/// Current and previous-poll levels for every [`Button`].
///
/// Call [`begin_poll`](Self::begin_poll) exactly once per poll cycle, before
/// applying that cycle's updates with [`set`](Self::set).  Edges are then
/// derived from the two snapshots:
///
/// ```rust
/// use boxcar_core::input::{Button, ButtonStates};
///
/// let mut states = ButtonStates::default();
///
/// states.begin_poll();
/// states.set(Button::Cross, true);
/// assert!(states.went_down(Button::Cross));
///
/// // Still held on the next poll: level stays high, edge is gone.
/// states.begin_poll();
/// assert!(states.is_pressed(Button::Cross));
/// assert!(!states.went_down(Button::Cross));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonStates {
    current: [bool; BUTTON_COUNT],
    previous: [bool; BUTTON_COUNT],
}

impl ButtonStates {
    /// Starts a new poll cycle: the current levels become the previous levels.
    ///
    /// Levels carry over until changed, matching devices that only report
    /// transitions.
    pub fn begin_poll(&mut self) {
        self.previous = self.current;
    }

    /// Sets the level of `button` for the current poll cycle.
    pub fn set(&mut self, button: Button, pressed: bool) {
        self.current[button.index()] = pressed;
    }

    /// Releases every button for the current poll cycle.
    pub fn release_all(&mut self) {
        self.current = [false; BUTTON_COUNT];
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.current[button.index()]
    }

    /// `true` only on the poll where `button` changed from released to pressed.
    pub fn went_down(&self, button: Button) -> bool {
        !self.previous[button.index()] && self.current[button.index()]
    }

    /// `true` only on the poll where `button` changed from pressed to released.
    pub fn went_up(&self, button: Button) -> bool {
        self.previous[button.index()] && !self.current[button.index()]
    }

    /// Buttons that are currently pressed, in index order.
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }
}

/// Normalised values for every [`Axis`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisValues {
    values: [f32; AXIS_COUNT],
}

impl AxisValues {
    pub fn get(&self, axis: Axis) -> f32 {
        self.values[axis.index()]
    }

    /// Stores `value`, clamped to the axis' valid range.
    pub fn set(&mut self, axis: Axis, value: f32) {
        let lower = if axis.is_trigger() { 0.0 } else { -1.0 };
        let value = if value.is_nan() { 0.0 } else { value };
        self.values[axis.index()] = value.clamp(lower, 1.0);
    }
}

/// The D-pad as reported by a point-of-view hat, in hundredths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpadHat {
    Centered,
    Up,
    Right,
    Down,
    Left,
}

impl DpadHat {
    /// Decodes a POV hat angle.  Diagonals and "released" both read as
    /// [`DpadHat::Centered`].
    pub fn from_pov(angle: u32) -> Self {
        match angle {
            0 => DpadHat::Up,
            9000 => DpadHat::Right,
            18000 => DpadHat::Down,
            27000 => DpadHat::Left,
            _ => DpadHat::Centered,
        }
    }

    /// Writes this hat position into the four D-pad button levels.
    ///
    /// Exactly one arrow is pressed afterwards, or none when centred.
    pub fn apply(self, states: &mut ButtonStates) {
        states.set(Button::DpadUp, self == DpadHat::Up);
        states.set(Button::DpadRight, self == DpadHat::Right);
        states.set(Button::DpadDown, self == DpadHat::Down);
        states.set(Button::DpadLeft, self == DpadHat::Left);
    }
}
