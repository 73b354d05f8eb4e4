//! In-memory simulated vehicle.
//!
//! [`SimulatedVehicle`] implements [`Transport`] without any I/O.  It plays the
//! vehicle side of the protocol: on connect it queues a greeting, it decodes
//! every host write with [`decode_command`], records the commands, and replies
//! according to its [`AckPolicy`].
//!
//! A cloneable [`SimulatorHandle`] stays with the test (or with the binary in
//! `--simulate` mode) to inspect what was written and to inject sensor hits.
//!
//! # Usage in tests
//!
//! ```ignore
//! let (vehicle, sim) = SimulatedVehicle::new();
//! let link = VehicleLink::new(vehicle, LinkTiming::default());
//! link.connect().await?;
//!
//! link.move_forwards().await?;
//! assert_eq!(sim.commands(), vec![Command::Forward]);
//!
//! sim.trigger(SensorEvent::LeftSensorTriggered);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use boxcar_core::protocol::messages::{OP_ACK, OP_LEFT_SENSOR, OP_RIGHT_SENSOR};
use boxcar_core::{decode_command, Command, SensorEvent};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::application::transport::{Transport, TransportError};

/// The greeting the simulated vehicle sends after each connect.
pub const SIMULATED_GREETING: &[u8] = b"BoxCar simulator ready\r\n";

/// A byte the vehicle never sends; used by [`AckPolicy::Garbage`].
const GARBAGE_BYTE: u8 = 0x7F;

/// How the simulated vehicle answers each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Reply with an ack immediately.
    #[default]
    Always,
    /// Never reply.  Tests release commands with [`SimulatorHandle::ack`].
    Never,
    /// Reply with a byte that is not an ack.
    Garbage,
}

#[derive(Debug, Default)]
struct VehicleState {
    connected: bool,
    unreachable: bool,
    ack_policy: AckPolicy,
    inbound: VecDeque<u8>,
    commands: Vec<Command>,
    raw_writes: Vec<Vec<u8>>,
    connect_count: usize,
    speed: Option<u8>,
}

/// Inner state shared by the transport and its handles.
#[derive(Debug, Default)]
struct Sim {
    state: Mutex<VehicleState>,
    data_ready: Notify,
}

impl Sim {
    fn state(&self) -> MutexGuard<'_, VehicleState> {
        // A panic while holding this lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_inbound(&self, bytes: &[u8]) {
        self.state().inbound.extend(bytes.iter().copied());
        self.data_ready.notify_one();
    }
}

/// The transport half of the simulator.
#[derive(Debug)]
pub struct SimulatedVehicle {
    sim: Arc<Sim>,
}

impl SimulatedVehicle {
    /// Creates a reachable vehicle that acks every command.
    pub fn new() -> (Self, SimulatorHandle) {
        Self::with_policy(AckPolicy::Always)
    }

    pub fn with_policy(ack_policy: AckPolicy) -> (Self, SimulatorHandle) {
        let sim = Arc::new(Sim::default());
        sim.state().ack_policy = ack_policy;
        (
            Self {
                sim: Arc::clone(&sim),
            },
            SimulatorHandle { sim },
        )
    }

    /// Creates a vehicle whose `connect` always fails with `LinkNotFound`.
    pub fn unreachable() -> (Self, SimulatorHandle) {
        let (vehicle, handle) = Self::new();
        vehicle.sim.state().unreachable = true;
        (vehicle, handle)
    }
}

#[async_trait]
impl Transport for SimulatedVehicle {
    fn is_connected(&self) -> bool {
        self.sim.state().connected
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        {
            let mut state = self.sim.state();
            if state.unreachable {
                return Err(TransportError::LinkNotFound("simulated vehicle".into()));
            }
            state.connected = true;
            state.connect_count += 1;
            state.inbound.clear();
        }
        self.sim.push_inbound(SIMULATED_GREETING);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.sim.state().connected = false;
        self.sim.data_ready.notify_one();
        Ok(())
    }

    fn is_data_available(&mut self) -> bool {
        !self.sim.state().inbound.is_empty()
    }

    async fn wait_for_data(&mut self) -> Result<(), TransportError> {
        loop {
            {
                let state = self.sim.state();
                if !state.inbound.is_empty() {
                    return Ok(());
                }
                if !state.connected {
                    return Err(TransportError::Closed);
                }
            }
            self.sim.data_ready.notified().await;
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.sim.state();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut replies = Vec::new();
        {
            let mut state = self.sim.state();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.raw_writes.push(bytes.to_vec());

            let mut rest = bytes;
            while !rest.is_empty() {
                match decode_command(rest) {
                    Ok((command, consumed)) => {
                        debug!(?command, "simulated vehicle received");
                        if let Command::SetSpeed(speed) = command {
                            state.speed = Some(speed);
                        }
                        state.commands.push(command);
                        match state.ack_policy {
                            AckPolicy::Always => replies.push(OP_ACK),
                            AckPolicy::Garbage => replies.push(GARBAGE_BYTE),
                            AckPolicy::Never => {}
                        }
                        rest = &rest[consumed..];
                    }
                    Err(e) => {
                        warn!("simulated vehicle rejected write: {e}");
                        break;
                    }
                }
            }
        }
        if !replies.is_empty() {
            self.sim.push_inbound(&replies);
        }
        Ok(())
    }
}

/// Test-side handle onto a [`SimulatedVehicle`].
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    sim: Arc<Sim>,
}

impl SimulatorHandle {
    /// Every command the vehicle decoded, in arrival order.
    pub fn commands(&self) -> Vec<Command> {
        self.sim.state().commands.clone()
    }

    /// Every `write` call's bytes, in order.
    pub fn raw_writes(&self) -> Vec<Vec<u8>> {
        self.sim.state().raw_writes.clone()
    }

    pub fn clear_commands(&self) {
        let mut state = self.sim.state();
        state.commands.clear();
        state.raw_writes.clear();
    }

    /// The last speed the vehicle was told to use.
    pub fn speed(&self) -> Option<u8> {
        self.sim.state().speed
    }

    pub fn connect_count(&self) -> usize {
        self.sim.state().connect_count
    }

    pub fn is_connected(&self) -> bool {
        self.sim.state().connected
    }

    /// Bytes queued for the host that it has not read yet.
    pub fn pending_inbound(&self) -> Vec<u8> {
        self.sim.state().inbound.iter().copied().collect()
    }

    pub fn set_ack_policy(&self, policy: AckPolicy) {
        self.sim.state().ack_policy = policy;
    }

    /// Sends one ack byte, releasing a command written under
    /// [`AckPolicy::Never`].
    pub fn ack(&self) {
        self.sim.push_inbound(&[OP_ACK]);
    }

    /// Reports an IR sensor hit to the host.
    pub fn trigger(&self, sensor: SensorEvent) {
        let byte = match sensor {
            SensorEvent::LeftSensorTriggered => OP_LEFT_SENSOR,
            SensorEvent::RightSensorTriggered => OP_RIGHT_SENSOR,
        };
        self.sim.push_inbound(&[byte]);
    }

    /// Queues arbitrary bytes for the host.
    pub fn send_raw(&self, bytes: &[u8]) {
        self.sim.push_inbound(bytes);
    }

    /// Simulates the vehicle dropping the connection.
    pub fn drop_link(&self) {
        self.sim.state().connected = false;
        self.sim.data_ready.notify_one();
    }
}
