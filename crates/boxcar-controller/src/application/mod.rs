//! Application layer of the controller.
//!
//! # What lives here?
//!
//! - **`transport`** and **`input`** – the ports: traits for the byte stream to
//!   the vehicle and for the game controller.  Implementations are injected
//!   from the infrastructure layer.
//!
//! - **`vehicle_link`** – the protocol engine.  Turns "move forward" into one
//!   acknowledged byte on the wire, tracks the acknowledged direction and
//!   publishes IR sensor events.
//!
//! - **`ui_events`** – the bus that carries control-surface button presses to
//!   whichever drive mode is active.
//!
//! - **`state_machine`** – a generic tick-driven state machine.
//!
//! - **`drive`** – the Idle, ManualDrive and AutonomousDrive modes run by that
//!   state machine.

pub mod drive;
pub mod input;
pub mod state_machine;
pub mod transport;
pub mod ui_events;
pub mod vehicle_link;
