//! Idle: the vehicle is kept stopped until the operator picks a mode.

use tracing::info;

use crate::application::drive::{DriveContext, DriveError, DriveState};
use crate::application::state_machine::Transition;
use crate::application::ui_events::{UiEvent, UiEventSubscriber};

pub struct IdleState {
    ctx: DriveContext,
    ui: UiEventSubscriber,
    /// Set after a fault; cleared once a `Stop` has been acknowledged.
    force_stop: bool,
}

impl IdleState {
    pub fn new(ctx: DriveContext) -> Self {
        let ui = ctx.ui.subscribe();
        Self {
            ctx,
            ui,
            force_stop: false,
        }
    }

    /// Idle entered because another mode failed mid-command.  The first
    /// ticks write `Stop` regardless of the recorded direction.
    pub fn after_fault(ctx: DriveContext) -> Self {
        Self {
            force_stop: true,
            ..Self::new(ctx)
        }
    }

    pub fn context(&self) -> &DriveContext {
        &self.ctx
    }

    pub async fn on_enter(&mut self) -> Result<(), DriveError> {
        info!("idling");
        Ok(())
    }

    pub async fn on_update(&mut self) -> Result<Transition<DriveState>, DriveError> {
        let frame = self.ctx.poll_gamepad().await?;
        let events = self.ui.drain();

        if frame.auto_toggle_pressed || events.contains(&UiEvent::AutoMode(true)) {
            return Ok(Transition::To(DriveState::autonomous(self.ctx.clone())));
        }
        if frame.drive_enable_held {
            return Ok(Transition::To(DriveState::manual_gamepad(self.ctx.clone())));
        }
        if let Some(first) = events.iter().copied().find(|e| e.is_directional()) {
            return Ok(Transition::To(DriveState::manual_touch(
                self.ctx.clone(),
                Some(first),
            )));
        }

        if self.force_stop {
            self.ctx.link.force_stop().await?;
            self.force_stop = false;
        } else if !self.ctx.link.is_stopped_moving() {
            self.ctx.link.stop_moving().await?;
        }
        Ok(Transition::Stay)
    }

    pub async fn on_exit(&mut self) -> Result<(), DriveError> {
        Ok(())
    }
}
