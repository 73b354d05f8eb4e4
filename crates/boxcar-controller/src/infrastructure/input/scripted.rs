//! Input sources that need no physical controller.
//!
//! - [`ScriptedInput`] replays frames pushed through a [`ScriptHandle`], one
//!   per poll, and keeps reporting the last frame once the script runs out.
//!   The binary feeds it from console `pad` lines; integration tests use it
//!   to hold a button for N ticks or to produce a single down-edge.
//! - [`NullInput`] reports nothing pressed, for runs driven only by UI
//!   events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use boxcar_core::input::{AxisValues, DEFAULT_DEAD_ZONE};
use boxcar_core::{Axis, Button, ButtonStates};

use crate::application::input::{InputError, InputSource};
use crate::infrastructure::input::ps4::Ps4Report;

/// One controller snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub pressed: Vec<Button>,
    pub axes: Vec<(Axis, f32)>,
}

impl InputFrame {
    /// Nothing pressed, every axis at rest.
    pub fn released() -> Self {
        Self::default()
    }

    pub fn pressing(buttons: &[Button]) -> Self {
        Self {
            pressed: buttons.to_vec(),
            axes: Vec::new(),
        }
    }

    pub fn with_axis(mut self, axis: Axis, value: f32) -> Self {
        self.axes.push((axis, value));
        self
    }
}

#[derive(Debug)]
struct Script {
    frames: VecDeque<InputFrame>,
    failure: Option<String>,
    polls: usize,
    dead_zone: f32,
}

/// Replays scripted controller frames.
#[derive(Debug)]
pub struct ScriptedInput {
    script: Arc<Mutex<Script>>,
    buttons: ButtonStates,
    axes: AxisValues,
}

/// Pushes frames into a [`ScriptedInput`] from outside the drive loop.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptedInput {
    pub fn new() -> (Self, ScriptHandle) {
        Self::with_dead_zone(DEFAULT_DEAD_ZONE)
    }

    /// `dead_zone` applies to raw reports pushed with
    /// [`ScriptHandle::push_report`].
    pub fn with_dead_zone(dead_zone: f32) -> (Self, ScriptHandle) {
        let input = Self {
            script: Arc::new(Mutex::new(Script {
                frames: VecDeque::new(),
                failure: None,
                polls: 0,
                dead_zone,
            })),
            buttons: ButtonStates::default(),
            axes: AxisValues::default(),
        };
        let handle = ScriptHandle {
            script: Arc::clone(&input.script),
        };
        (input, handle)
    }

    fn apply(&mut self, frame: &InputFrame) {
        self.buttons.release_all();
        for &button in &frame.pressed {
            self.buttons.set(button, true);
        }
        self.axes = AxisValues::default();
        for &(axis, value) in &frame.axes {
            self.axes.set(axis, value);
        }
    }
}

impl ScriptHandle {
    /// Queues `frame` for the next poll that has no earlier frame queued.
    pub fn push(&self, frame: InputFrame) {
        self.lock().frames.push_back(frame);
    }

    /// Normalises a raw controller report and queues it as one frame.
    pub fn push_report(&self, report: &Ps4Report) {
        let mut script = self.lock();
        let frame = report.to_frame(script.dead_zone);
        script.frames.push_back(frame);
    }

    /// Queues `frame` for `polls` consecutive polls.
    pub fn hold(&self, frame: InputFrame, polls: usize) {
        let mut script = self.lock();
        for _ in 0..polls {
            script.frames.push_back(frame.clone());
        }
    }

    /// Makes every following poll fail with [`InputError::Device`].
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Number of polls served so far.
    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Result<(), InputError> {
        let next = {
            let mut script = self
                .script
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(message) = script.failure.clone() {
                return Err(InputError::Device(message));
            }
            script.polls += 1;
            script.frames.pop_front()
        };

        self.buttons.begin_poll();
        if let Some(frame) = next {
            self.apply(&frame);
        }
        Ok(())
    }

    fn is_pressed(&self, button: Button) -> bool {
        self.buttons.is_pressed(button)
    }

    fn went_down(&self, button: Button) -> bool {
        self.buttons.went_down(button)
    }

    fn went_up(&self, button: Button) -> bool {
        self.buttons.went_up(button)
    }

    fn axis(&self, axis: Axis) -> f32 {
        self.axes.get(axis)
    }
}

/// A controller with nothing pressed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInput;

impl InputSource for NullInput {
    fn poll(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn is_pressed(&self, _button: Button) -> bool {
        false
    }

    fn went_down(&self, _button: Button) -> bool {
        false
    }

    fn went_up(&self, _button: Button) -> bool {
        false
    }

    fn axis(&self, _axis: Axis) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_button_gives_one_down_edge() {
        // Arrange
        let (mut input, script) = ScriptedInput::new();
        script.hold(InputFrame::pressing(&[Button::Cross]), 5);

        // Act
        let edges = (0..5)
            .filter(|_| {
                input.poll().unwrap();
                input.went_down(Button::Cross)
            })
            .count();

        // Assert
        assert_eq!(edges, 1);
        assert!(input.is_pressed(Button::Cross));
    }

    #[test]
    fn test_last_frame_is_held_after_script_ends() {
        let (mut input, script) = ScriptedInput::new();
        script.push(InputFrame::pressing(&[Button::R2]).with_axis(Axis::RightTrigger, 0.4));

        input.poll().unwrap();
        input.poll().unwrap();
        input.poll().unwrap();

        assert!(input.is_pressed(Button::R2));
        assert!(!input.went_down(Button::R2));
        assert_eq!(input.axis(Axis::RightTrigger), 0.4);
        assert_eq!(script.polls(), 3);
    }

    #[test]
    fn test_release_gives_up_edge() {
        let (mut input, script) = ScriptedInput::new();
        script.push(InputFrame::pressing(&[Button::DpadUp]));
        script.push(InputFrame::released());

        input.poll().unwrap();
        input.poll().unwrap();

        assert!(input.went_up(Button::DpadUp));
        assert!(!input.is_pressed(Button::DpadUp));
    }

    #[test]
    fn test_raw_report_goes_through_dead_zone() {
        // Arrange – left stick barely off centre, D-pad down
        let (mut input, script) = ScriptedInput::with_dead_zone(0.2);
        script.push_report(
            &Ps4Report::default()
                .with_pov(18000)
                .with_axis(Axis::LeftStickX, 0x9000),
        );

        // Act
        input.poll().unwrap();

        // Assert
        assert!(input.went_down(Button::DpadDown));
        assert_eq!(input.axis(Axis::LeftStickX), 0.0);
    }

    #[test]
    fn test_device_failure_is_reported() {
        let (mut input, script) = ScriptedInput::new();
        script.fail_with("unplugged");

        assert!(matches!(input.poll(), Err(InputError::Device(m)) if m == "unplugged"));
    }

    #[test]
    fn test_null_input_reports_nothing() {
        let mut input = NullInput;
        input.poll().unwrap();

        assert!(!input.is_pressed(Button::R2));
        assert_eq!(input.axis(Axis::RightTrigger), 0.0);
    }
}
