//! Frame-rate aware smoothing primitives shared by every per-frame stage.
//!
//! All tuning factors are authored against a 60 Hz reference frame. Running
//! at another rate rescales them so one second of motion looks the same.

/// Reference frame rate the per-frame factors are tuned at.
pub const REFERENCE_HZ: f32 = 60.0;

/// Convert a per-reference-frame interpolation factor into one for `dt` seconds.
///
/// `1 - (1 - f)^(dt * 60)`; a 1/60 s step returns `f` unchanged.
pub fn frame_factor(factor: f32, dt: f32) -> f32 {
    let factor = factor.clamp(0.0, 1.0);
    let frames = sanitize_dt(dt) * REFERENCE_HZ;
    1.0 - (1.0 - factor).powf(frames)
}

/// Convert a per-reference-frame decay multiplier into one for `dt` seconds.
pub fn frame_decay(multiplier: f32, dt: f32) -> f32 {
    multiplier.clamp(0.0, 1.0).powf(sanitize_dt(dt) * REFERENCE_HZ)
}

/// Exponential approach: `current + (target - current) * factor`.
pub fn approach(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

/// Frame deltas arrive from the host scheduler; a tab switch can hand us
/// seconds, a broken clock NaN. Anything beyond a quarter second is capped.
pub fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, 0.25)
    } else {
        0.0
    }
}

/// Replace NaN/Inf with `fallback`.
pub fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}
