//! Controller input adapters.
//!
//! - **`scripted`** – `ScriptedInput` (frames pushed from the console or from
//!   tests) and `NullInput` (nothing pressed).
//! - **`ps4`** – normalisation of raw PS4 reports (buttons, POV hat, 16-bit
//!   axes) into frames.

pub mod ps4;
pub mod scripted;

pub use ps4::Ps4Report;
pub use scripted::{InputFrame, NullInput, ScriptHandle, ScriptedInput};
