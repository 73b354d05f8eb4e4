//! boxcar-controller library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does boxcar-controller do? (for beginners)
//!
//! The BoxCar is a small two-motor vehicle with an ESP32 on board.  It
//! understands one-byte commands on its serial port ("forward", "turn left",
//! "speed 200", ...) and answers every command with a one-byte
//! acknowledgment.  Two IR sensors at the front report obstacles with
//! unsolicited bytes of their own.
//!
//! The controller runs on a host computer and:
//!
//! 1. Opens the byte stream to the vehicle and reads its greeting.
//! 2. Sends one command at a time and waits for the acknowledgment before
//!    the next (see `application::vehicle_link`).
//! 3. Runs a tick-driven state machine with three drive modes: Idle,
//!    ManualDrive (game controller or touch buttons) and AutonomousDrive
//!    (drive forward and turn away from obstacles).
//! 4. Shuts down cleanly: the vehicle is stopped and the link closed.

/// Application layer: protocol engine, state machine and drive modes.
pub mod application;

/// Infrastructure layer: transports, input adapters, console and config.
pub mod infrastructure;
