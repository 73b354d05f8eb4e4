//! Domain module: pure vehicle-control logic with no I/O.
//!
//! - **`direction`** – the last acknowledged motion state of the vehicle.
//! - **`speed`** – throttle-to-speed mapping and the hysteresis filter that
//!   keeps jittery analog input from flooding the link.

pub mod direction;
pub mod speed;

pub use direction::Direction;
pub use speed::{
    SpeedGovernor, SpeedRange, DEFAULT_MAX_SPEED, DEFAULT_MIN_SPEED, DEFAULT_SPEED_HYSTERESIS,
};
