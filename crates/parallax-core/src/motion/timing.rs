//! L4 Atomic Layer: Time calculation utilities for motion
//!
//! Pure functions for tween progress and interpolation, plus a fixed-step
//! clock that converts wall-clock deltas into whole animation frames.

/// Calculate tween progress (0.0 to 1.0) from elapsed time, start delay and duration
///
/// Returns 0 while the delay hasn't elapsed and 1 for zero-length tweens
/// once it has.
#[inline]
pub fn progress(elapsed: f64, delay: f64, duration: f64) -> f64 {
    let active = elapsed - delay;
    if active < 0.0 || active.is_nan() {
        return 0.0;
    }
    if duration <= 0.0 {
        return 1.0;
    }
    (active / duration).clamp(0.0, 1.0)
}

/// Check if a tween is complete
#[inline]
pub fn is_complete(elapsed: f64, delay: f64, duration: f64) -> bool {
    elapsed >= delay + duration.max(0.0)
}

/// Linear interpolation between two values
///
/// # Arguments
/// * `from` - Start value
/// * `to` - End value
/// * `t` - Interpolation factor [0.0, 1.0]
#[inline]
pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Clamp to the unit interval, mapping NaN to 0
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fixed-step frame clock
///
/// Accumulates wall-clock time and hands out whole frames of `step` seconds,
/// so the engine only ever sees constant `dt` values.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: f64,
    accumulator: f64,
    max_catch_up: u32,
}

impl FrameClock {
    /// Frames handed out per `advance` call at most; the rest is dropped
    pub const DEFAULT_MAX_CATCH_UP: u32 = 5;

    pub fn new(step: f64) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step
        } else {
            1.0 / 60.0
        };
        Self {
            step,
            accumulator: 0.0,
            max_catch_up: Self::DEFAULT_MAX_CATCH_UP,
        }
    }

    pub fn with_max_catch_up(mut self, frames: u32) -> Self {
        self.max_catch_up = frames.max(1);
        self
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Add elapsed wall-clock seconds and return how many frames to run
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }

        let mut frames = 0;
        while self.accumulator >= self.step && frames < self.max_catch_up {
            self.accumulator -= self.step;
            frames += 1;
        }

        // Too far behind: drop the backlog instead of spiralling
        if self.accumulator >= self.step {
            self.accumulator %= self.step;
        }

        frames
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp() {
        assert!((lerp(0.0, 100.0, 0.0) - 0.0).abs() < 0.001);
        assert!((lerp(0.0, 100.0, 0.5) - 50.0).abs() < 0.001);
        assert!((lerp(0.0, 100.0, 1.0) - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_progress_with_delay() {
        assert_eq!(progress(0.1, 0.2, 0.5), 0.0);
        assert!((progress(0.45, 0.2, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(progress(2.0, 0.2, 0.5), 1.0);
    }

    #[test]
    fn test_progress_zero_duration() {
        assert_eq!(progress(0.0, 0.0, 0.0), 1.0);
        assert!(is_complete(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_frame_clock_whole_frames() {
        let mut clock = FrameClock::new(0.01);
        assert_eq!(clock.advance(0.005), 0);
        assert_eq!(clock.advance(0.016), 2);
    }

    #[test]
    fn test_frame_clock_drops_backlog() {
        let mut clock = FrameClock::new(0.01).with_max_catch_up(3);
        assert_eq!(clock.advance(1.0), 3);
        assert!(clock.advance(0.0) < 1);
    }

    #[test]
    fn test_frame_clock_ignores_bad_input() {
        let mut clock = FrameClock::new(-1.0);
        assert!((clock.step() - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(clock.advance(f64::NAN), 0);
        assert_eq!(clock.advance(-5.0), 0);
    }
}
