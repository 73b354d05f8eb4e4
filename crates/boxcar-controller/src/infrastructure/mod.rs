//! Infrastructure layer for the controller.
//!
//! Contains the adapters behind the application ports plus the outer
//! surfaces of the binary.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `boxcar_core`, but MUST NOT be imported by the `application` layer outside
//! of tests.
//!
//! # Sub-modules
//!
//! - **`transport`** – implementations of `Transport`: a TCP bridge to the
//!   vehicle's serial port and an in-memory simulated vehicle.
//!
//! - **`input`** – implementations of `InputSource` and the normalisation of
//!   raw PS4 controller reports.
//!
//! - **`console`** – the stdin control surface that stands in for the phone UI.
//!
//! - **`storage`** – TOML configuration loading and saving.

pub mod console;
pub mod input;
pub mod storage;
pub mod transport;
