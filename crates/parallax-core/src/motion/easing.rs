//! L4 Atomic Layer: Easing curves
//!
//! Every curve maps normalized tween time onto normalized progress. Inputs
//! outside [0, 1] are clamped and NaN counts as the start of the tween, so a
//! curve never hands a non-finite value to the interpolation that follows.

pub use crate::config::EasingType;

impl EasingType {
    /// Eased progress for normalized time `t`
    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            EasingType::None => step(t),
            EasingType::Linear => t,
            EasingType::Cubic => power_out(t, 3),
            EasingType::Quintic => power_out(t, 5),
            EasingType::EaseOut => expo_out(t),
            EasingType::EaseInOut => power_in_out(t, 3),
        }
    }
}

/// Holds the start pose until the tween ends
#[inline]
fn step(t: f64) -> f64 {
    if t >= 1.0 {
        1.0
    } else {
        0.0
    }
}

/// Mirror of `t^n`: fast start, settles into the end value
#[inline]
fn power_out(t: f64, n: i32) -> f64 {
    1.0 - (1.0 - t).powi(n)
}

/// `t^n` up to the midpoint, mirrored after it
#[inline]
fn power_in_out(t: f64, n: i32) -> f64 {
    if t < 0.5 {
        (2.0 * t).powi(n) / 2.0
    } else {
        1.0 - (2.0 - 2.0 * t).powi(n) / 2.0
    }
}

/// Halves the remaining distance every tenth of the tween
#[inline]
fn expo_out(t: f64) -> f64 {
    if t >= 1.0 {
        1.0
    } else {
        1.0 - (-10.0 * t).exp2()
    }
}
