//! Byte-stream transports to the vehicle.
//!
//! - [`tcp::TcpTransport`] – a serial-over-TCP bridge, used in production.
//! - [`simulated::SimulatedVehicle`] – an in-memory vehicle for tests and for
//!   running the controller with `--simulate`.

pub mod simulated;
pub mod tcp;

pub use simulated::{AckPolicy, SimulatedVehicle, SimulatorHandle};
pub use tcp::TcpTransport;
