//! The controller-input port the drive states read from.
//!
//! An [`InputSource`] exposes a game controller as logical buttons and
//! normalised axes.  Each call to [`InputSource::poll`] captures one snapshot
//! and shifts the previous snapshot into the "previous" slot, so edge queries
//! ([`went_down`](InputSource::went_down), [`went_up`](InputSource::went_up))
//! compare exactly two consecutive polls.
//!
//! Drive states call `poll` exactly once per tick.  Calling it twice in one
//! tick would make every edge vanish before the state could see it.

use boxcar_core::{Axis, Button};
use thiserror::Error;

/// Errors raised while polling an input device.
#[derive(Debug, Error)]
pub enum InputError {
    /// No controller is attached.
    #[error("no input device found")]
    NoInputDeviceFound,

    /// The device reported an error while being read.
    #[error("input device error: {0}")]
    Device(String),
}

/// A pollable game controller.
#[cfg_attr(test, mockall::automock)]
pub trait InputSource: Send {
    /// Captures a new snapshot of every button and axis.
    fn poll(&mut self) -> Result<(), InputError>;

    /// `true` if `button` was down at the most recent poll.
    fn is_pressed(&self, button: Button) -> bool;

    /// `true` if `button` is down now and was up at the poll before.
    fn went_down(&self, button: Button) -> bool;

    /// `true` if `button` is up now and was down at the poll before.
    fn went_up(&self, button: Button) -> bool;

    /// Normalised value of `axis` at the most recent poll: `[-1, 1]` for
    /// sticks, `[0, 1]` for triggers.
    fn axis(&self, axis: Axis) -> f32;
}
