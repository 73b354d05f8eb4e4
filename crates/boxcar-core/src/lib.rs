//! # boxcar-core
//!
//! Shared library for the BoxCar remote vehicle containing the command
//! protocol codec, the vehicle direction model and the controller input model.
//!
//! This crate has zero dependencies on sockets, async runtimes or input
//! devices.  The controller application builds its protocol engine, drive
//! states and device adapters on top of it.
//!
//! # Architecture overview (for beginners)
//!
//! The BoxCar is a small two-motor vehicle with an ESP32 on board.  A host
//! program drives it by writing one-byte commands over a serial link; the
//! vehicle answers every command with an acknowledgment byte and reports IR
//! proximity sensor hits on its own.
//!
//! - **`protocol`** – What the bytes mean.  Outbound [`Command`]s are encoded
//!   with [`encode_command`]; inbound bytes are scanned with
//!   [`decode_inbound`] into acknowledgments and [`SensorEvent`]s.
//!
//! - **`domain`** – Pure control logic: the acknowledged [`Direction`] and the
//!   throttle-to-speed mapping with its hysteresis filter.
//!
//! - **`input`** – A platform-independent model of a game controller: logical
//!   buttons, analog axes, dead-zone normalisation and edge detection.

pub mod domain;
pub mod input;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `boxcar_core::Command` instead of `boxcar_core::protocol::messages::Command`.
pub use domain::{Direction, SpeedGovernor, SpeedRange};
pub use input::{Axis, Button, ButtonStates};
pub use protocol::codec::{decode_command, decode_inbound, encode_command, InboundBatch, ProtocolError};
pub use protocol::messages::{Command, InboundEvent, SensorEvent};
