//! Raw device value normalisation.
//!
//! Controllers report axes as unsigned 16-bit values centred on `0x8000`.
//! Sticks are mapped to `[-1, 1]` and pass through a dead zone so a stick at
//! rest reads exactly zero; triggers are mapped to `[0, 1]`.

/// Default stick dead zone.
pub const DEFAULT_DEAD_ZONE: f32 = 0.15;

/// `1 / 2^15`
const RAW_SCALE: f32 = 1.0 / 32768.0;

/// Maps a raw stick value to `[-1, 1]`, zeroing anything inside `dead_zone`.
///
/// Pass `inverted = true` for vertical axes, where the device reports "up" as
/// the low end of the range.
pub fn normalize_stick(raw: u16, dead_zone: f32, inverted: bool) -> f32 {
    let mut value = f32::from(raw) * RAW_SCALE - 1.0;
    if inverted {
        value = -value;
    }
    let value = if value.abs() > dead_zone { value } else { 0.0 };
    value.clamp(-1.0, 1.0)
}

/// Maps a raw trigger value to `[0, 1]`.
pub fn normalize_trigger(raw: u16) -> f32 {
    (f32::from(raw) * RAW_SCALE * 0.5).clamp(0.0, 1.0)
}
