//! All BoxCar protocol message types.
//!
//! The protocol is deliberately tiny: every host → vehicle command is a single
//! opcode byte, except `SetSpeed` which carries one operand byte.  The vehicle
//! answers every command with an acknowledgment byte and may spontaneously
//! report IR sensor triggers.
//!
//! The inbound opcode space overlaps the outbound one (`0x01`–`0x03` are used
//! in both directions).  That is fine because the host only ever interprets
//! bytes it *reads*; it never reflects its own writes.

use serde::{Deserialize, Serialize};

// ── Host → vehicle opcodes ────────────────────────────────────────────────────

/// Stop all motors.
pub const OP_STOP: u8 = 0x00;
/// Drive forwards.
pub const OP_FORWARD: u8 = 0x01;
/// Drive backwards.
pub const OP_BACKWARD: u8 = 0x02;
/// Turn left on the spot.
pub const OP_LEFT: u8 = 0x03;
/// Turn right on the spot.
pub const OP_RIGHT: u8 = 0x04;
/// Set motor speed; followed by one speed byte.
pub const OP_SET_SPEED: u8 = 0x05;

// ── Vehicle → host opcodes ────────────────────────────────────────────────────

/// The vehicle processed the most recently written command.
pub const OP_ACK: u8 = 0x01;
/// The left IR proximity sensor fired.
pub const OP_LEFT_SENSOR: u8 = 0x02;
/// The right IR proximity sensor fired.
pub const OP_RIGHT_SENSOR: u8 = 0x03;

/// Size of the buffer used for a single inbound read.
pub const INBOUND_BUFFER_SIZE: usize = 256;

// ── Commands ──────────────────────────────────────────────────────────────────

/// A command sent from the host to the vehicle.
///
/// Commands are ephemeral: they are built for one call, encoded, written and
/// dropped.  Use [`crate::protocol::encode_command`] to get the wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Stop,
    Forward,
    Backward,
    Left,
    Right,
    /// Motor speed, `0` (stalled) to `255` (full power).
    SetSpeed(u8),
}

impl Command {
    /// The opcode byte that starts this command on the wire.
    pub fn opcode(self) -> u8 {
        match self {
            Command::Stop => OP_STOP,
            Command::Forward => OP_FORWARD,
            Command::Backward => OP_BACKWARD,
            Command::Left => OP_LEFT,
            Command::Right => OP_RIGHT,
            Command::SetSpeed(_) => OP_SET_SPEED,
        }
    }

    /// Number of bytes this command occupies on the wire.
    pub fn encoded_len(self) -> usize {
        match self {
            Command::SetSpeed(_) => 2,
            _ => 1,
        }
    }
}

// ── Inbound events ────────────────────────────────────────────────────────────

/// Which IR sensor fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorEvent {
    LeftSensorTriggered,
    RightSensorTriggered,
}

/// A decoded vehicle → host byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// Acknowledgment of the last command.
    Ack,
    /// An IR sensor fired.
    Sensor(SensorEvent),
}

impl TryFrom<u8> for InboundEvent {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            OP_ACK => Ok(InboundEvent::Ack),
            OP_LEFT_SENSOR => Ok(InboundEvent::Sensor(SensorEvent::LeftSensorTriggered)),
            OP_RIGHT_SENSOR => Ok(InboundEvent::Sensor(SensorEvent::RightSensorTriggered)),
            _ => Err(()),
        }
    }
}

impl From<InboundEvent> for u8 {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::Ack => OP_ACK,
            InboundEvent::Sensor(SensorEvent::LeftSensorTriggered) => OP_LEFT_SENSOR,
            InboundEvent::Sensor(SensorEvent::RightSensorTriggered) => OP_RIGHT_SENSOR,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
