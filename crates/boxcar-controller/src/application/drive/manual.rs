//! Manual driving, from either the game controller or the UI buttons.
//!
//! # Gamepad surface
//!
//! While drive-enable is held, every tick:
//!
//! 1. maps the throttle axis onto the speed range and sends the speed if it
//!    moved outside the hysteresis band since the last speed *sent*;
//! 2. issues the highest-priority held direction (left, right, forward,
//!    backward), or stops the vehicle when none is held.
//!
//! The engine ignores a direction equal to the current one, so holding a
//! button costs one write, not one per tick.
//!
//! # Touch surface
//!
//! UI direction buttons issue moves as they arrive and the speed slider is
//! forwarded as-is.  The vehicle keeps its last direction until another button
//! is pressed; nothing is sent on quiet ticks.

use boxcar_core::{Command, SpeedGovernor};
use tracing::{debug, info};

use crate::application::drive::{DriveContext, DriveError, DriveState};
use crate::application::state_machine::Transition;
use crate::application::ui_events::{UiEvent, UiEventSubscriber};

/// Where manual commands come from.
#[derive(Debug, Clone)]
pub enum ControlSurface {
    Gamepad { governor: SpeedGovernor },
    /// `pending` is a command carried over from the UI event that left Idle.
    Touch { pending: Option<Command> },
}

pub struct ManualDriveState {
    ctx: DriveContext,
    ui: UiEventSubscriber,
    surface: ControlSurface,
}

impl ManualDriveState {
    pub fn gamepad(ctx: DriveContext) -> Self {
        let governor = SpeedGovernor::new(ctx.tuning.speed_hysteresis);
        Self::with_surface(ctx, ControlSurface::Gamepad { governor })
    }

    pub fn touch(ctx: DriveContext, first: Option<UiEvent>) -> Self {
        let pending = first.and_then(UiEvent::command);
        Self::with_surface(ctx, ControlSurface::Touch { pending })
    }

    fn with_surface(ctx: DriveContext, surface: ControlSurface) -> Self {
        let ui = ctx.ui.subscribe();
        Self { ctx, ui, surface }
    }

    pub fn context(&self) -> &DriveContext {
        &self.ctx
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    pub async fn on_enter(&mut self) -> Result<(), DriveError> {
        match self.surface {
            ControlSurface::Gamepad { .. } => info!("manual drive (gamepad)"),
            ControlSurface::Touch { .. } => info!("manual drive (UI buttons)"),
        }
        Ok(())
    }

    pub async fn on_update(&mut self) -> Result<Transition<DriveState>, DriveError> {
        let frame = self.ctx.poll_gamepad().await?;
        let events = self.ui.drain();
        let link = &self.ctx.link;

        match &mut self.surface {
            ControlSurface::Gamepad { governor } => {
                if frame.auto_toggle_pressed || events.contains(&UiEvent::AutoMode(true)) {
                    return Ok(Transition::To(DriveState::autonomous(self.ctx.clone())));
                }
                if !frame.drive_enable_held || events.contains(&UiEvent::Stop) {
                    return Ok(Transition::To(DriveState::idle(self.ctx.clone())));
                }

                let speed = self.ctx.tuning.speed_range.speed_for_throttle(frame.throttle);
                if governor.needs_update(speed) {
                    link.change_speed(speed).await?;
                    governor.mark_sent(speed);
                }

                match frame.direction_command() {
                    Some(command) => link.execute(command).await?,
                    None if !link.is_stopped_moving() => link.stop_moving().await?,
                    None => {}
                }
            }
            ControlSurface::Touch { pending } => {
                if let Some(command) = pending.take() {
                    link.execute(command).await?;
                }
                for event in events {
                    match event {
                        UiEvent::AutoMode(true) => {
                            return Ok(Transition::To(DriveState::autonomous(self.ctx.clone())));
                        }
                        UiEvent::Stop => {
                            return Ok(Transition::To(DriveState::idle(self.ctx.clone())));
                        }
                        UiEvent::AutoMode(false) => debug!("auto mode already off"),
                        other => {
                            if let Some(command) = other.command() {
                                link.execute(command).await?;
                            }
                        }
                    }
                }
            }
        }
        Ok(Transition::Stay)
    }

    pub async fn on_exit(&mut self) -> Result<(), DriveError> {
        Ok(())
    }
}
