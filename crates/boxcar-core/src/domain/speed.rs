//! Throttle → motor speed mapping.
//!
//! # Why a minimum speed? (for beginners)
//!
//! The vehicle's DC motors stall below a certain PWM duty cycle, so a throttle
//! of zero does not map to speed zero.  Instead the normalised throttle
//! `p ∈ [0, 1]` is stretched over the usable band:
//!
//! ```text
//! speed = round((max - min) · p + min)
//! ```
//!
//! With the default band `150..=255`, an untouched trigger still produces a
//! crawl (150) and a fully pressed trigger produces full power (255).
//!
//! # Hysteresis
//!
//! Analog triggers jitter by a count or two even when held still.  Sending a
//! `SetSpeed` command for every jitter would flood the link (every command is
//! acknowledged), so [`SpeedGovernor`] only lets a new value through when it
//! differs from the last *sent* value by more than the hysteresis band.

use serde::{Deserialize, Serialize};

/// Default slowest speed at which the motors still turn.
pub const DEFAULT_MIN_SPEED: u8 = 150;
/// Default full-power speed.
pub const DEFAULT_MAX_SPEED: u8 = 255;
/// Default hysteresis band for speed updates.
pub const DEFAULT_SPEED_HYSTERESIS: u8 = 1;

/// The usable motor speed band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: u8,
    pub max: u8,
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SPEED,
            max: DEFAULT_MAX_SPEED,
        }
    }
}

impl SpeedRange {
    /// Maps a normalised throttle to a motor speed.
    ///
    /// `throttle` is clamped to `[0, 1]`; NaN counts as zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use boxcar_core::domain::SpeedRange;
    ///
    /// let range = SpeedRange::default();
    /// assert_eq!(range.speed_for_throttle(0.0), 150);
    /// assert_eq!(range.speed_for_throttle(1.0), 255);
    /// ```
    pub fn speed_for_throttle(&self, throttle: f32) -> u8 {
        let p = if throttle.is_nan() {
            0.0
        } else {
            throttle.clamp(0.0, 1.0)
        };
        let span = f32::from(self.max) - f32::from(self.min);
        let speed = (span * p + f32::from(self.min)).round();
        speed.clamp(0.0, 255.0) as u8
    }
}

/// Suppresses speed updates that fall inside the hysteresis band.
#[derive(Debug, Clone, Default)]
pub struct SpeedGovernor {
    hysteresis: u8,
    last_sent: Option<u8>,
}

impl SpeedGovernor {
    pub fn new(hysteresis: u8) -> Self {
        Self {
            hysteresis,
            last_sent: None,
        }
    }

    /// Returns `true` if `speed` should be transmitted.
    ///
    /// The first speed is always transmitted; afterwards only values that
    /// differ from the last transmitted one by more than the hysteresis band.
    pub fn needs_update(&self, speed: u8) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => speed.abs_diff(last) > self.hysteresis,
        }
    }

    /// Records that `speed` was transmitted.
    pub fn mark_sent(&mut self, speed: u8) {
        self.last_sent = Some(speed);
    }

    pub fn last_sent(&self) -> Option<u8> {
        self.last_sent
    }
}
