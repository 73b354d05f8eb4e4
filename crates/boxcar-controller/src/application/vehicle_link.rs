//! VehicleLink: the acknowledged command protocol engine.
//!
//! Every public operation follows the same three steps:
//!
//! 1. Acquire the command lock, giving up after `lock_timeout`.
//! 2. Perform one protocol step (write a command and wait for its ack, or
//!    connect, or disconnect).
//! 3. Release the lock.  The guard is dropped on every return path.
//!
//! The lock guards the transport, the one-shot ack flag and the writer side of
//! the [`Direction`] watch channel.  A background listener task takes the same
//! lock every `listener_period` to drain bytes that arrive between commands,
//! so the ack wait inside a command and the listener never decode at the same
//! time.
//!
//! # Why track the direction? (for beginners)
//!
//! Drive states run every 10 ms and tend to re-issue the command they issued
//! on the previous tick ("D-pad up is still held, move forward").  The engine
//! remembers the last *acknowledged* direction and turns a repeated
//! directional command into a no-op, so holding a button produces one write,
//! not a hundred per second.  `change_speed` is not filtered this way; the
//! drive states suppress redundant speeds themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use boxcar_core::protocol::messages::INBOUND_BUFFER_SIZE;
use boxcar_core::{decode_inbound, encode_command, Command, Direction, SensorEvent};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::application::transport::{Transport, TransportError};

/// Number of sensor events a slow subscriber may fall behind.
pub const SENSOR_CHANNEL_CAPACITY: usize = 32;

/// Errors returned by [`VehicleLink`] operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The command lock was not acquired in time.
    #[error("command lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// No inbound data arrived within the acknowledgment window.
    #[error("no acknowledgment within {0:?}")]
    AckTimeout(Duration),

    /// Inbound data arrived but contained no acknowledgment.
    #[error("vehicle replied without an acknowledgment")]
    AckMismatch,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl LinkError {
    /// `true` for failures of a single exchange that leave the link usable.
    ///
    /// Transport errors are not protocol faults: the session is over.
    pub fn is_protocol_fault(&self) -> bool {
        !matches!(self, LinkError::Transport(_))
    }
}

/// Timing parameters of the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub ack_timeout: Duration,
    pub lock_timeout: Duration,
    pub listener_period: Duration,
    pub greeting_timeout: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            lock_timeout: Duration::from_secs(10),
            listener_period: Duration::from_millis(100),
            greeting_timeout: Duration::from_secs(1),
        }
    }
}

// ── Shared engine state ───────────────────────────────────────────────────────

/// Everything that must only be touched while holding the command lock.
struct Locked {
    transport: Box<dyn Transport>,
    ack_received: bool,
}

/// State shared between the engine handle and its listener task.
struct Shared {
    locked: Mutex<Locked>,
    timing: LinkTiming,
    /// Written only while `locked` is held.
    direction: watch::Sender<Direction>,
    sensors: broadcast::Sender<SensorEvent>,
    connected: AtomicBool,
}

impl Shared {
    async fn lock(&self) -> Result<MutexGuard<'_, Locked>, LinkError> {
        time::timeout(self.timing.lock_timeout, self.locked.lock())
            .await
            .map_err(|_| LinkError::LockTimeout(self.timing.lock_timeout))
    }

    /// Reads whatever is available and dispatches it.
    ///
    /// An ack sets the one-shot flag; sensor events are broadcast.  Returns
    /// without reading when nothing is available.
    fn drain_inbound(&self, locked: &mut Locked) -> Result<(), TransportError> {
        if !locked.transport.is_data_available() {
            return Ok(());
        }
        let mut buf = [0u8; INBOUND_BUFFER_SIZE];
        let n = locked.transport.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }

        let batch = decode_inbound(&buf[..n]);
        trace!(bytes = n, ignored = batch.ignored, "decoded inbound buffer");
        if batch.ack {
            debug!("ack received");
            locked.ack_received = true;
        }
        for event in batch.sensors {
            debug!(?event, "sensor event");
            // No subscribers is normal outside autonomous mode.
            let _ = self.sensors.send(event);
        }
        Ok(())
    }

    /// Waits for the reply to a command that has just been written.
    async fn await_ack(&self, locked: &mut Locked) -> Result<(), LinkError> {
        let window = self.timing.ack_timeout;
        match time::timeout(window, locked.transport.wait_for_data()).await {
            Err(_) => return Err(LinkError::AckTimeout(window)),
            Ok(waited) => waited?,
        }
        self.drain_inbound(locked)?;
        if locked.ack_received {
            Ok(())
        } else {
            Err(LinkError::AckMismatch)
        }
    }

    fn mark_closed_on(&self, err: &LinkError) {
        if matches!(
            err,
            LinkError::Transport(TransportError::Closed | TransportError::Io(_))
        ) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }
}

// ── VehicleLink ───────────────────────────────────────────────────────────────

/// The acknowledged command link to one vehicle.
///
/// Share it between tasks with `Arc<VehicleLink>`; every method takes `&self`.
pub struct VehicleLink {
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl VehicleLink {
    pub fn new(transport: impl Transport + 'static, timing: LinkTiming) -> Self {
        let (direction, _) = watch::channel(Direction::Stopped);
        let (sensors, _) = broadcast::channel(SENSOR_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                locked: Mutex::new(Locked {
                    transport: Box::new(transport),
                    ack_received: false,
                }),
                timing,
                direction,
                sensors,
                connected: AtomicBool::new(false),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn timing(&self) -> LinkTiming {
        self.shared.timing
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// The last acknowledged direction.
    pub fn direction(&self) -> Direction {
        *self.shared.direction.borrow()
    }

    pub fn is_stopped_moving(&self) -> bool {
        self.direction() == Direction::Stopped
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// A receiver that observes every acknowledged direction change.
    pub fn watch_direction(&self) -> watch::Receiver<Direction> {
        self.shared.direction.subscribe()
    }

    /// A receiver for IR sensor events decoded from now on.
    pub fn subscribe_sensors(&self) -> broadcast::Receiver<SensorEvent> {
        self.shared.sensors.subscribe()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Opens the transport, consumes the vehicle's greeting and starts the
    /// background listener.  Does nothing if already connected.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let mut locked = self.shared.lock().await?;
        if self.is_connected() && locked.transport.is_connected() {
            debug!("connect skipped: link already connected");
            return Ok(());
        }

        locked.transport.connect().await?;
        locked.ack_received = false;

        let greeting_window = self.shared.timing.greeting_timeout;
        match time::timeout(greeting_window, locked.transport.wait_for_data()).await {
            Ok(Ok(())) => {
                let mut buf = [0u8; INBOUND_BUFFER_SIZE];
                let n = locked.transport.read(&mut buf)?;
                info!(
                    "vehicle greeting: {:?}",
                    String::from_utf8_lossy(&buf[..n]).trim_end()
                );
                debug!("greeting bytes: {:02x?}", &buf[..n]);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => warn!("no greeting within {greeting_window:?}"),
        }

        self.shared.connected.store(true, Ordering::SeqCst);
        drop(locked);

        let handle = tokio::spawn(run_listener(Arc::clone(&self.shared)));
        *self.listener.lock().await = Some(handle);
        info!("vehicle link connected");
        Ok(())
    }

    /// Closes the transport and waits for the listener task to finish.
    /// Does nothing if not connected.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let mut locked = self.shared.lock().await?;
        let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);
        let result = if locked.transport.is_connected() {
            locked.transport.disconnect().await
        } else {
            Ok(())
        };
        drop(locked);

        // The listener may have died on its own after a transport error; its
        // handle still needs joining.
        if let Some(handle) = self.listener.lock().await.take() {
            if let Err(e) = handle.await {
                error!("listener task failed: {e}");
            }
        }

        if was_connected {
            info!("vehicle link disconnected");
        } else {
            debug!("disconnect skipped: link not connected");
        }
        result.map_err(LinkError::from)
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Sends a motor speed.  Always transmitted.
    pub async fn change_speed(&self, speed: u8) -> Result<(), LinkError> {
        self.send(Command::SetSpeed(speed)).await
    }

    pub async fn move_forwards(&self) -> Result<(), LinkError> {
        self.send(Command::Forward).await
    }

    pub async fn move_backwards(&self) -> Result<(), LinkError> {
        self.send(Command::Backward).await
    }

    pub async fn turn_left(&self) -> Result<(), LinkError> {
        self.send(Command::Left).await
    }

    pub async fn turn_right(&self) -> Result<(), LinkError> {
        self.send(Command::Right).await
    }

    pub async fn stop_moving(&self) -> Result<(), LinkError> {
        self.send(Command::Stop).await
    }

    /// Writes `Stop` even if the recorded direction is already `Stopped`.
    ///
    /// After a failed exchange the vehicle may have acted on a command whose
    /// ack never arrived, so the recorded direction cannot be trusted.
    pub async fn force_stop(&self) -> Result<(), LinkError> {
        self.transmit(Command::Stop, true).await
    }

    /// Dispatches `command` to the matching operation.
    pub async fn execute(&self, command: Command) -> Result<(), LinkError> {
        match command {
            Command::Stop => self.stop_moving().await,
            Command::Forward => self.move_forwards().await,
            Command::Backward => self.move_backwards().await,
            Command::Left => self.turn_left().await,
            Command::Right => self.turn_right().await,
            Command::SetSpeed(speed) => self.change_speed(speed).await,
        }
    }

    /// Writes one command and waits for its acknowledgment.
    ///
    /// A directional command equal to the current direction is skipped.  The
    /// direction is updated only after the ack, while the lock is still held.
    async fn send(&self, command: Command) -> Result<(), LinkError> {
        self.transmit(command, false).await
    }

    async fn transmit(&self, command: Command, forced: bool) -> Result<(), LinkError> {
        let mut locked = self.shared.lock().await?;

        let target = command.direction();
        if !forced && target.is_some() && target == Some(self.direction()) {
            trace!(?command, "skipped: direction unchanged");
            return Ok(());
        }
        if !locked.transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }

        let result = self.exchange(&mut *locked, command).await;
        match &result {
            Ok(()) => {
                if let Some(direction) = target {
                    self.shared.direction.send_replace(direction);
                }
            }
            Err(e) => self.shared.mark_closed_on(e),
        }
        result
    }

    async fn exchange(&self, locked: &mut Locked, command: Command) -> Result<(), LinkError> {
        let bytes = encode_command(command);
        locked.ack_received = false;
        debug!(?command, "write {:02x?}", bytes);
        locked.transport.write(&bytes).await?;
        self.shared.await_ack(locked).await
    }
}

/// Drains inbound bytes every listener period while the link is connected.
async fn run_listener(shared: Arc<Shared>) {
    let period = shared.timing.listener_period;
    debug!(?period, "listener started");
    while shared.connected.load(Ordering::SeqCst) {
        match shared.lock().await {
            Ok(mut locked) => {
                if !locked.transport.is_connected() {
                    shared.connected.store(false, Ordering::SeqCst);
                    break;
                }
                if let Err(e) = shared.drain_inbound(&mut locked) {
                    error!("listener stopped: {e}");
                    shared.connected.store(false, Ordering::SeqCst);
                    break;
                }
            }
            Err(e) => warn!("listener iteration skipped: {e}"),
        }
        time::sleep(period).await;
    }
    debug!("listener exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::simulated::{AckPolicy, SimulatedVehicle};

    #[tokio::test]
    async fn test_connect_reads_greeting_and_starts_listener() {
        // Arrange
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());

        // Act
        link.connect().await.unwrap();

        // Assert – the greeting was consumed, not left for the decoder
        assert!(link.is_connected());
        assert!(sim.pending_inbound().is_empty());
        link.disconnect().await.unwrap();
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_second_connect_is_skipped() {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());

        link.connect().await.unwrap();
        link.connect().await.unwrap();

        assert_eq!(sim.connect_count(), 1);
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_direction_is_written_once() {
        // Arrange
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();

        // Act
        link.move_forwards().await.unwrap();
        link.move_forwards().await.unwrap();

        // Assert
        assert_eq!(sim.commands(), vec![Command::Forward]);
        assert_eq!(link.direction(), Direction::Forward);
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_change_speed_is_never_deduplicated() {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();

        link.change_speed(200).await.unwrap();
        link.change_speed(200).await.unwrap();

        assert_eq!(
            sim.commands(),
            vec![Command::SetSpeed(200), Command::SetSpeed(200)]
        );
        assert!(link.is_stopped_moving(), "speed does not change direction");
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_already_stopped_writes_nothing() {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();

        link.stop_moving().await.unwrap();

        assert!(sim.commands().is_empty());
        link.disconnect().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_stop_writes_stop_after_unacknowledged_forward() {
        // Arrange – Forward reaches the vehicle but its ack never does
        let (vehicle, sim) = SimulatedVehicle::with_policy(AckPolicy::Never);
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();
        let err = link.move_forwards().await.unwrap_err();
        assert!(matches!(err, LinkError::AckTimeout(_)), "{err:?}");
        assert!(link.is_stopped_moving(), "direction still reads Stopped");
        sim.set_ack_policy(AckPolicy::Always);

        // Act
        link.stop_moving().await.unwrap();
        link.force_stop().await.unwrap();

        // Assert – the plain stop is skipped, the forced one is written
        assert_eq!(sim.commands(), vec![Command::Forward, Command::Stop]);
        assert!(link.is_stopped_moving());
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_force_stop_on_disconnected_link_fails() {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());

        let err = link.force_stop().await.unwrap_err();

        assert!(
            matches!(err, LinkError::Transport(TransportError::NotConnected)),
            "{err:?}"
        );
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_reply_is_ack_mismatch_and_keeps_direction() {
        // Arrange
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();
        sim.set_ack_policy(AckPolicy::Garbage);

        // Act
        let result = link.turn_left().await;

        // Assert
        assert!(matches!(result, Err(LinkError::AckMismatch)));
        assert_eq!(link.direction(), Direction::Stopped);
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_on_disconnected_link_fails() {
        let (vehicle, _sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());

        let result = link.move_backwards().await;

        assert!(matches!(
            result,
            Err(LinkError::Transport(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_execute_dispatches_to_matching_operation() {
        let (vehicle, sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();

        link.execute(Command::Right).await.unwrap();
        link.execute(Command::SetSpeed(180)).await.unwrap();
        link.execute(Command::Stop).await.unwrap();

        assert_eq!(
            sim.commands(),
            vec![Command::Right, Command::SetSpeed(180), Command::Stop]
        );
        assert_eq!(link.direction(), Direction::Stopped);
        link.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_direction_sees_acknowledged_changes() {
        let (vehicle, _sim) = SimulatedVehicle::new();
        let link = VehicleLink::new(vehicle, LinkTiming::default());
        link.connect().await.unwrap();
        let mut rx = link.watch_direction();

        link.move_backwards().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Direction::Backward);
        link.disconnect().await.unwrap();
    }

    #[test]
    fn test_protocol_fault_classification() {
        assert!(LinkError::AckMismatch.is_protocol_fault());
        assert!(LinkError::AckTimeout(Duration::from_secs(10)).is_protocol_fault());
        assert!(LinkError::LockTimeout(Duration::from_secs(10)).is_protocol_fault());
        assert!(!LinkError::Transport(TransportError::Closed).is_protocol_fault());
    }
}
