//! Volume normalization.
//!
//! Converts each backend's native volume representation to the canonical
//! 0-100 integer scale and back. The endpoint backend works with a
//! `0.0..=1.0` scalar; the mixer backend with an integer in `0..=max`.

/// Lowest canonical volume.
pub const MIN_PERCENT: i32 = 0;

/// Highest canonical volume.
pub const MAX_PERCENT: i32 = 100;

/// Clamp a requested volume to `[0, 100]`.
pub fn clamp_percent(percent: i32) -> i32 {
    percent.clamp(MIN_PERCENT, MAX_PERCENT)
}

/// Scalar (0.0 to 1.0) to percent, rounding to the nearest integer.
pub fn scalar_to_percent(scalar: f32) -> i32 {
    let scalar = if scalar.is_nan() { 0.0 } else { scalar.clamp(0.0, 1.0) };
    (f64::from(scalar) * 100.0).round() as i32
}

/// Percent to scalar (0.0 to 1.0). Out-of-range input is clamped first.
pub fn percent_to_scalar(percent: i32) -> f32 {
    clamp_percent(percent) as f32 / 100.0
}

/// Native mixer value to percent: `round(native / max * 100)`.
pub fn native_to_percent(native: u32, native_max: u32) -> i32 {
    if native_max == 0 {
        return MIN_PERCENT;
    }
    let percent = (f64::from(native) / f64::from(native_max) * 100.0).round() as i32;
    clamp_percent(percent)
}

/// Percent to native mixer value: `floor(percent / 100 * max)`.
pub fn percent_to_native(percent: i32, native_max: u32) -> u32 {
    let percent = clamp_percent(percent);
    (f64::from(percent) / 100.0 * f64::from(native_max)).floor() as u32
}

/// Next volume after one step of `unit`, saturating at the scale bounds.
pub fn step_percent(current: i32, unit: i32) -> i32 {
    clamp_percent(current.saturating_add(unit))
}
