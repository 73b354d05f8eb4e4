//! Byte codec for the BoxCar command protocol.
//!
//! Wire format:
//! ```text
//! host -> vehicle:  [opcode:1]            Stop, Forward, Backward, Left, Right
//!                   [0x05:1][speed:1]     SetSpeed
//! vehicle -> host:  [opcode:1]            Ack, LeftSensor, RightSensor
//! ```
//! There is no framing beyond the opcode itself: inbound bytes are scanned one
//! by one, outbound commands are at most two bytes long.

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{
    Command, InboundEvent, SensorEvent, OP_BACKWARD, OP_FORWARD, OP_LEFT, OP_RIGHT,
    OP_SET_SPEED, OP_STOP,
};

/// Errors that can occur while decoding host → vehicle commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// There were no bytes to decode.
    #[error("no bytes to decode")]
    Empty,

    /// The opcode byte is not a known command.
    #[error("unknown command opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A `SetSpeed` opcode was not followed by its speed byte.
    #[error("set-speed opcode is missing its speed operand")]
    MissingSpeedOperand,
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] into its wire bytes.
///
/// # Examples
///
/// ```rust
/// use boxcar_core::protocol::{encode_command, Command};
///
/// assert_eq!(encode_command(Command::Forward), vec![0x01]);
/// assert_eq!(encode_command(Command::SetSpeed(200)), vec![0x05, 200]);
/// ```
pub fn encode_command(command: Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(command.encoded_len());
    buf.push(command.opcode());
    if let Command::SetSpeed(speed) = command {
        buf.push(speed);
    }
    buf
}

/// Decodes one [`Command`] from the beginning of `bytes`.
///
/// Returns the command and the number of bytes consumed so the caller can
/// advance its cursor.  This is the vehicle side of the protocol; the host
/// only needs it to simulate a vehicle.
///
/// # Errors
///
/// Returns [`ProtocolError`] if `bytes` is empty, starts with an unknown
/// opcode, or ends in the middle of a `SetSpeed` command.
pub fn decode_command(bytes: &[u8]) -> Result<(Command, usize), ProtocolError> {
    let opcode = *bytes.first().ok_or(ProtocolError::Empty)?;
    let command = match opcode {
        OP_STOP => Command::Stop,
        OP_FORWARD => Command::Forward,
        OP_BACKWARD => Command::Backward,
        OP_LEFT => Command::Left,
        OP_RIGHT => Command::Right,
        OP_SET_SPEED => {
            let speed = *bytes.get(1).ok_or(ProtocolError::MissingSpeedOperand)?;
            Command::SetSpeed(speed)
        }
        other => return Err(ProtocolError::UnknownOpcode(other)),
    };
    Ok((command, command.encoded_len()))
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Everything found in one inbound read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundBatch {
    /// At least one acknowledgment byte was present.
    pub ack: bool,
    /// Sensor triggers in the order they were received.
    pub sensors: Vec<SensorEvent>,
    /// Number of unrecognised bytes that were skipped.
    pub ignored: usize,
}

/// Scans inbound bytes in order and collects the events they carry.
///
/// Unrecognised bytes are skipped so that newer vehicle firmware can add
/// opcodes without breaking older hosts.
///
/// # Examples
///
/// ```rust
/// use boxcar_core::protocol::{decode_inbound, SensorEvent};
///
/// let batch = decode_inbound(&[0x02, 0x01, 0x7F]);
/// assert!(batch.ack);
/// assert_eq!(batch.sensors, vec![SensorEvent::LeftSensorTriggered]);
/// assert_eq!(batch.ignored, 1);
/// ```
pub fn decode_inbound(bytes: &[u8]) -> InboundBatch {
    let mut batch = InboundBatch::default();
    for &byte in bytes {
        match InboundEvent::try_from(byte) {
            Ok(InboundEvent::Ack) => batch.ack = true,
            Ok(InboundEvent::Sensor(event)) => batch.sensors.push(event),
            Err(()) => {
                trace!("ignoring unknown inbound byte 0x{byte:02X}");
                batch.ignored += 1;
            }
        }
    }
    batch
}

// ── Tests ─────────────────────────────────────────────────────────────────────
