//! Raw PS4 controller reports.
//!
//! A device adapter (DirectInput, hidapi, evdev) sees the controller as
//! digital buttons, one point-of-view hat for the D-pad and six unsigned
//! 16-bit axes.  [`Ps4Report::to_frame`] turns such a report into the
//! normalised [`InputFrame`] the rest of the controller works with.

use boxcar_core::input::{normalize_stick, normalize_trigger, DpadHat};
use boxcar_core::{Axis, Button, ButtonStates};

use crate::infrastructure::input::scripted::InputFrame;

/// Raw value of an axis at rest.
pub const RAW_CENTRE: u16 = 0x8000;

/// POV value reported while the D-pad is released.
pub const POV_CENTRED: u32 = u32::MAX;

/// One raw controller report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ps4Report {
    /// Digital buttons that are down.  D-pad buttons listed here are ignored;
    /// the D-pad comes from `pov`.
    pub buttons: Vec<Button>,
    /// D-pad angle in hundredths of a degree.
    pub pov: u32,
    /// Raw axis values, indexed by [`Axis::index`].
    pub axes: [u16; 6],
}

impl Default for Ps4Report {
    fn default() -> Self {
        let mut axes = [RAW_CENTRE; 6];
        axes[Axis::LeftTrigger.index()] = 0;
        axes[Axis::RightTrigger.index()] = 0;
        Self {
            buttons: Vec::new(),
            pov: POV_CENTRED,
            axes,
        }
    }
}

impl Ps4Report {
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn with_pov(mut self, pov: u32) -> Self {
        self.pov = pov;
        self
    }

    pub fn with_axis(mut self, axis: Axis, raw: u16) -> Self {
        self.axes[axis.index()] = raw;
        self
    }

    /// Normalises this report.  Sticks pass through `dead_zone`; the vertical
    /// stick axes are inverted so that up is positive.
    pub fn to_frame(&self, dead_zone: f32) -> InputFrame {
        let mut states = ButtonStates::default();
        for &button in &self.buttons {
            states.set(button, true);
        }
        DpadHat::from_pov(self.pov).apply(&mut states);

        let axes = Axis::ALL
            .into_iter()
            .map(|axis| {
                let raw = self.axes[axis.index()];
                let value = match axis {
                    Axis::LeftTrigger | Axis::RightTrigger => normalize_trigger(raw),
                    Axis::LeftStickY | Axis::RightStickY => normalize_stick(raw, dead_zone, true),
                    Axis::LeftStickX | Axis::RightStickX => normalize_stick(raw, dead_zone, false),
                };
                (axis, value)
            })
            .collect();

        InputFrame {
            pressed: states.pressed().collect(),
            axes,
        }
    }
}

#[cfg(test)]
mod tests {
    use boxcar_core::input::DEFAULT_DEAD_ZONE;

    use super::*;

    fn axis_value(frame: &InputFrame, axis: Axis) -> f32 {
        frame
            .axes
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, v)| *v)
            .unwrap_or_default()
    }

    #[test]
    fn test_resting_report_is_neutral() {
        let frame = Ps4Report::default().to_frame(DEFAULT_DEAD_ZONE);

        assert!(frame.pressed.is_empty());
        for axis in Axis::ALL {
            assert_eq!(axis_value(&frame, axis), 0.0, "{axis:?}");
        }
    }

    #[test]
    fn test_pov_selects_exactly_one_arrow() {
        // Arrange – a stale DpadUp in the button list must not survive
        let report = Ps4Report::default()
            .with_button(Button::DpadUp)
            .with_pov(9000);

        // Act
        let frame = report.to_frame(DEFAULT_DEAD_ZONE);

        // Assert
        assert_eq!(frame.pressed, vec![Button::DpadRight]);
    }

    #[test]
    fn test_full_trigger_and_pushed_stick() {
        let report = Ps4Report::default()
            .with_button(Button::R2)
            .with_axis(Axis::RightTrigger, u16::MAX)
            .with_axis(Axis::LeftStickY, 0);

        let frame = report.to_frame(DEFAULT_DEAD_ZONE);

        assert_eq!(frame.pressed, vec![Button::R2]);
        assert!(axis_value(&frame, Axis::RightTrigger) > 0.99);
        assert_eq!(axis_value(&frame, Axis::LeftStickY), 1.0, "up is positive");
    }
}
