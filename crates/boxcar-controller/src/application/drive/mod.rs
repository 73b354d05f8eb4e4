//! The three driving modes and the glue that runs them on a
//! [`StateMachine`](crate::application::state_machine::StateMachine).
//!
//! | Mode | Entered when | Does |
//! |---|---|---|
//! | [`Idle`](idle::IdleState) | start-up, drive-enable released, UI stop, after a fault | stops the vehicle |
//! | [`ManualDrive`](manual::ManualDriveState) | drive-enable held, or a UI direction button | follows the D-pad / throttle, or the UI buttons |
//! | [`AutonomousDrive`](autonomous::AutonomousDriveState) | auto-toggle pressed, or the UI auto switch | drives forward and steers away from IR sensor hits |
//!
//! Every mode owns a clone of the [`DriveContext`] plus its own bookkeeping.
//! Modes never switch themselves; they return a
//! [`Transition`] from `on_update` and the tick loop applies it.
//!
//! # Fault policy
//!
//! | Error | In Idle | In ManualDrive / AutonomousDrive |
//! |---|---|---|
//! | transport failure | halt | halt |
//! | ack timeout / mismatch, lock timeout, input error | retry next tick | fall back to Idle |
//!
//! Falling back to Idle is what gets the vehicle stopped.  The recorded
//! direction may be stale after a failed exchange, so that Idle writes an
//! unconditional `Stop` ([`VehicleLink::force_stop`]) on each tick until one
//! is acknowledged, then only stops the vehicle when it is recorded as moving.
//!
//! [`VehicleLink::force_stop`]: crate::application::vehicle_link::VehicleLink::force_stop

pub mod autonomous;
pub mod idle;
pub mod manual;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxcar_core::domain::DEFAULT_SPEED_HYSTERESIS;
use boxcar_core::{Axis, Button, Command, SpeedRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::application::input::{InputError, InputSource};
use crate::application::state_machine::{FaultAction, State, Transition};
use crate::application::ui_events::{UiEvent, UiEventBus};
use crate::application::vehicle_link::{LinkError, VehicleLink};

pub use autonomous::AutonomousDriveState;
pub use idle::IdleState;
pub use manual::{ControlSurface, ManualDriveState};

/// Errors raised inside a drive mode.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("vehicle link: {0}")]
    Link(#[from] LinkError),

    #[error("input: {0}")]
    Input(#[from] InputError),
}

impl DriveError {
    /// `true` when the link itself is gone and driving cannot continue.
    pub fn ends_session(&self) -> bool {
        matches!(self, DriveError::Link(e) if !e.is_protocol_fault())
    }
}

// ── Configuration carried by every mode ───────────────────────────────────────

/// Tunable driving parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveTuning {
    pub speed_range: SpeedRange,
    /// Minimum speed change (exclusive) before a new speed is sent.
    pub speed_hysteresis: u8,
    /// Speed used while driving autonomously.
    pub autonomous_speed: u8,
    /// How long the vehicle turns away from an IR sensor hit.
    pub dwell: Duration,
}

impl Default for DriveTuning {
    fn default() -> Self {
        Self {
            speed_range: SpeedRange::default(),
            speed_hysteresis: DEFAULT_SPEED_HYSTERESIS,
            autonomous_speed: u8::MAX,
            dwell: Duration::from_secs(2),
        }
    }
}

/// Which controller inputs drive which action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadBindings {
    /// A down-edge toggles autonomous mode.
    pub auto_toggle: Button,
    /// Must be held for manual driving.
    pub drive_enable: Button,
    pub left: Button,
    pub right: Button,
    pub forward: Button,
    pub backward: Button,
    /// Analog axis mapped onto the speed range.
    pub throttle: Axis,
}

impl Default for GamepadBindings {
    fn default() -> Self {
        Self {
            auto_toggle: Button::Cross,
            drive_enable: Button::R2,
            left: Button::DpadLeft,
            right: Button::DpadRight,
            forward: Button::DpadUp,
            backward: Button::DpadDown,
            throttle: Axis::RightTrigger,
        }
    }
}

/// The input source as shared by every drive mode.
pub type SharedInput = Arc<Mutex<Box<dyn InputSource>>>;

/// Wraps an [`InputSource`] for sharing between drive modes.
pub fn shared_input(source: impl InputSource + 'static) -> SharedInput {
    Arc::new(Mutex::new(Box::new(source)))
}

/// What one controller poll means for driving, after applying the bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadFrame {
    pub auto_toggle_pressed: bool,
    pub drive_enable_held: bool,
    pub left: bool,
    pub right: bool,
    pub forward: bool,
    pub backward: bool,
    pub throttle: f32,
}

impl GamepadFrame {
    /// The held direction with the highest priority: left, right, forward,
    /// backward.
    pub fn direction_command(&self) -> Option<Command> {
        if self.left {
            Some(Command::Left)
        } else if self.right {
            Some(Command::Right)
        } else if self.forward {
            Some(Command::Forward)
        } else if self.backward {
            Some(Command::Backward)
        } else {
            None
        }
    }
}

/// Everything a drive mode needs from the outside world.
#[derive(Clone)]
pub struct DriveContext {
    pub link: Arc<VehicleLink>,
    pub input: SharedInput,
    pub ui: UiEventBus,
    pub tuning: DriveTuning,
    pub bindings: GamepadBindings,
}

impl DriveContext {
    pub fn new(link: Arc<VehicleLink>, input: SharedInput, ui: UiEventBus) -> Self {
        Self {
            link,
            input,
            ui,
            tuning: DriveTuning::default(),
            bindings: GamepadBindings::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: DriveTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_bindings(mut self, bindings: GamepadBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Polls the controller once and reads the bound inputs.
    ///
    /// Each mode calls this exactly once per tick.
    pub async fn poll_gamepad(&self) -> Result<GamepadFrame, InputError> {
        let mut input = self.input.lock().await;
        input.poll()?;
        let b = &self.bindings;
        Ok(GamepadFrame {
            auto_toggle_pressed: input.went_down(b.auto_toggle),
            drive_enable_held: input.is_pressed(b.drive_enable),
            left: input.is_pressed(b.left),
            right: input.is_pressed(b.right),
            forward: input.is_pressed(b.forward),
            backward: input.is_pressed(b.backward),
            throttle: input.axis(b.throttle),
        })
    }
}

// ── DriveState ────────────────────────────────────────────────────────────────

/// The live driving mode.
pub enum DriveState {
    Idle(IdleState),
    ManualDrive(ManualDriveState),
    AutonomousDrive(AutonomousDriveState),
}

impl std::fmt::Debug for DriveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveState::Idle(_) => f.write_str("Idle"),
            DriveState::ManualDrive(_) => f.write_str("ManualDrive"),
            DriveState::AutonomousDrive(_) => f.write_str("AutonomousDrive"),
        }
    }
}

impl DriveState {
    pub fn idle(ctx: DriveContext) -> Self {
        DriveState::Idle(IdleState::new(ctx))
    }

    /// Idle that writes `Stop` before trusting the recorded direction again.
    pub fn idle_after_fault(ctx: DriveContext) -> Self {
        DriveState::Idle(IdleState::after_fault(ctx))
    }

    pub fn manual_gamepad(ctx: DriveContext) -> Self {
        DriveState::ManualDrive(ManualDriveState::gamepad(ctx))
    }

    /// Manual driving from UI buttons; `first` is applied on the first tick.
    pub fn manual_touch(ctx: DriveContext, first: Option<UiEvent>) -> Self {
        DriveState::ManualDrive(ManualDriveState::touch(ctx, first))
    }

    pub fn autonomous(ctx: DriveContext) -> Self {
        DriveState::AutonomousDrive(AutonomousDriveState::new(ctx))
    }

    pub fn context(&self) -> &DriveContext {
        match self {
            DriveState::Idle(s) => s.context(),
            DriveState::ManualDrive(s) => s.context(),
            DriveState::AutonomousDrive(s) => s.context(),
        }
    }
}

#[async_trait]
impl State for DriveState {
    type Error = DriveError;

    fn name(&self) -> &'static str {
        match self {
            DriveState::Idle(_) => "Idle",
            DriveState::ManualDrive(_) => "ManualDrive",
            DriveState::AutonomousDrive(_) => "AutonomousDrive",
        }
    }

    async fn on_enter(&mut self) -> Result<(), DriveError> {
        match self {
            DriveState::Idle(s) => s.on_enter().await,
            DriveState::ManualDrive(s) => s.on_enter().await,
            DriveState::AutonomousDrive(s) => s.on_enter().await,
        }
    }

    async fn on_update(&mut self) -> Result<Transition<Self>, DriveError> {
        match self {
            DriveState::Idle(s) => s.on_update().await,
            DriveState::ManualDrive(s) => s.on_update().await,
            DriveState::AutonomousDrive(s) => s.on_update().await,
        }
    }

    async fn on_exit(&mut self) -> Result<(), DriveError> {
        match self {
            DriveState::Idle(s) => s.on_exit().await,
            DriveState::ManualDrive(s) => s.on_exit().await,
            DriveState::AutonomousDrive(s) => s.on_exit().await,
        }
    }

    fn on_fault(&mut self, error: &DriveError) -> FaultAction<Self> {
        if error.ends_session() {
            error!(state = self.name(), "vehicle link lost: {error}");
            return FaultAction::Halt;
        }
        match self {
            DriveState::Idle(_) => {
                warn!("idle: {error}; retrying");
                FaultAction::Continue
            }
            _ => FaultAction::Recover(DriveState::idle_after_fault(self.context().clone())),
        }
    }
}
