//! Autonomous driving: go forward and turn away from IR sensor hits.
//!
//! A hit on the left sensor means an obstacle (or the edge of the track) on
//! the left, so the vehicle turns right for the dwell time, then resumes
//! forward.  The right sensor is handled symmetrically.  Sensor events that
//! arrive during the manoeuvre are discarded; they describe the turn, not the
//! road ahead.

use boxcar_core::SensorEvent;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time;
use tracing::{debug, info, warn};

use crate::application::drive::{DriveContext, DriveError, DriveState};
use crate::application::state_machine::Transition;
use crate::application::ui_events::{UiEvent, UiEventSubscriber};

pub struct AutonomousDriveState {
    ctx: DriveContext,
    ui: UiEventSubscriber,
    sensors: Option<broadcast::Receiver<SensorEvent>>,
    left_detected: bool,
    right_detected: bool,
}

impl AutonomousDriveState {
    pub fn new(ctx: DriveContext) -> Self {
        let ui = ctx.ui.subscribe();
        Self {
            ctx,
            ui,
            sensors: None,
            left_detected: false,
            right_detected: false,
        }
    }

    pub fn context(&self) -> &DriveContext {
        &self.ctx
    }

    pub async fn on_enter(&mut self) -> Result<(), DriveError> {
        info!("autonomous drive");
        self.sensors = Some(self.ctx.link.subscribe_sensors());
        self.ctx
            .link
            .change_speed(self.ctx.tuning.autonomous_speed)
            .await?;
        self.ctx.link.move_forwards().await?;
        Ok(())
    }

    pub async fn on_update(&mut self) -> Result<Transition<DriveState>, DriveError> {
        let frame = self.ctx.poll_gamepad().await?;
        let events = self.ui.drain();
        if frame.auto_toggle_pressed
            || events.contains(&UiEvent::AutoMode(false))
            || events.contains(&UiEvent::Stop)
        {
            return Ok(Transition::To(DriveState::idle(self.ctx.clone())));
        }

        self.collect_sensor_hits();
        let link = &self.ctx.link;
        if self.left_detected {
            debug!("left sensor: turning right");
            link.turn_right().await?;
            time::sleep(self.ctx.tuning.dwell).await;
            link.move_forwards().await?;
            self.forget_sensor_hits();
        } else if self.right_detected {
            debug!("right sensor: turning left");
            link.turn_left().await?;
            time::sleep(self.ctx.tuning.dwell).await;
            link.move_forwards().await?;
            self.forget_sensor_hits();
        }
        Ok(Transition::Stay)
    }

    pub async fn on_exit(&mut self) -> Result<(), DriveError> {
        self.sensors = None;
        Ok(())
    }

    /// Moves pending sensor events into the hit flags.
    fn collect_sensor_hits(&mut self) {
        let Some(rx) = self.sensors.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(SensorEvent::LeftSensorTriggered) => self.left_detected = true,
                Ok(SensorEvent::RightSensorTriggered) => self.right_detected = true,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("sensor subscriber lagged; {skipped} event(s) lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Drops the hit flags and every sensor event still queued.
    fn forget_sensor_hits(&mut self) {
        if let Some(rx) = self.sensors.as_mut() {
            let mut skipped = 0u64;
            loop {
                match rx.try_recv() {
                    Ok(_) => skipped += 1,
                    Err(TryRecvError::Lagged(lost)) => skipped += lost,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
            if skipped > 0 {
                debug!("discarded {skipped} sensor event(s) from the manoeuvre");
            }
        }
        self.left_detected = false;
        self.right_detected = false;
    }

    pub fn left_detected(&self) -> bool {
        self.left_detected
    }

    pub fn right_detected(&self) -> bool {
        self.right_detected
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use boxcar_core::Command;

    use super::*;
    use crate::application::drive::shared_input;
    use crate::application::input::MockInputSource;
    use crate::application::ui_events::UiEventBus;
    use crate::application::vehicle_link::{LinkTiming, VehicleLink};
    use crate::infrastructure::transport::simulated::{SimulatedVehicle, SimulatorHandle};

    fn idle_controller() -> MockInputSource {
        let mut mock = MockInputSource::new();
        mock.expect_poll().returning(|| Ok(()));
        mock.expect_went_down().returning(|_| false);
        mock.expect_is_pressed().returning(|_| false);
        mock.expect_axis().returning(|_| 0.0);
        mock
    }

    async fn connected() -> (DriveContext, SimulatorHandle) {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = Arc::new(VehicleLink::new(vehicle, LinkTiming::default()));
        link.connect().await.unwrap();
        let ctx = DriveContext::new(link, shared_input(idle_controller()), UiEventBus::default());
        (ctx, sim)
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_sets_speed_and_drives_forward() {
        let (ctx, sim) = connected().await;
        let mut state = AutonomousDriveState::new(ctx);

        state.on_enter().await.unwrap();

        assert_eq!(sim.commands(), vec![Command::SetSpeed(255), Command::Forward]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_right_sensor_turns_left_then_resumes() {
        // Arrange
        let (ctx, sim) = connected().await;
        let mut state = AutonomousDriveState::new(ctx);
        state.on_enter().await.unwrap();
        sim.clear_commands();
        sim.trigger(SensorEvent::RightSensorTriggered);
        time::sleep(Duration::from_millis(150)).await;

        // Act
        state.on_update().await.unwrap();

        // Assert
        assert_eq!(sim.commands(), vec![Command::Left, Command::Forward]);
        assert!(!state.left_detected() && !state.right_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ui_stop_returns_to_idle() {
        let (ctx, _sim) = connected().await;
        let bus = ctx.ui.clone();
        let mut state = AutonomousDriveState::new(ctx);
        state.on_enter().await.unwrap();
        bus.publish(UiEvent::Stop);

        let transition = state.on_update().await.unwrap();

        assert!(matches!(transition, Transition::To(DriveState::Idle(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_releases_sensor_subscription() {
        let (ctx, _sim) = connected().await;
        let mut state = AutonomousDriveState::new(ctx);
        state.on_enter().await.unwrap();

        state.on_exit().await.unwrap();

        assert!(state.sensors.is_none());
    }
}
