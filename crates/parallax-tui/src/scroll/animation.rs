//! L3 Molecular Layer: Scroll animation controller
//!
//! Combines core easing and timing utilities to ease the preview's scroll
//! offset between key presses.

use parallax_core::config::PreviewConfig;
use parallax_core::motion::timing::{is_complete, lerp, progress};
use parallax_core::EasingType;

/// Active scroll animation state
#[derive(Debug, Clone)]
struct ActiveAnimation {
    /// Seconds since the animation started
    elapsed: f64,
    from: f64,
    to: f64,
    duration: f64,
    easing: EasingType,
}

/// Scroll animation controller
///
/// Call `scroll_by()` / `scroll_to()` to move the target, then `update()`
/// every frame to get the current interpolated offset in pixels.
#[derive(Debug, Clone)]
pub struct ScrollAnimator {
    animation: Option<ActiveAnimation>,
    config: PreviewConfig,
    /// Current scroll offset (always up-to-date)
    current: f64,
    /// Pending delta for batching multiple key presses within one frame
    pending_delta: f64,
}

impl Default for ScrollAnimator {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}

impl ScrollAnimator {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            animation: None,
            config,
            current: 0.0,
            pending_delta: 0.0,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    #[inline]
    fn is_smooth(&self) -> bool {
        self.config.smooth_enabled && self.config.animation_duration_ms > 0
    }

    fn duration_secs(&self) -> f64 {
        self.config.animation_duration_ms as f64 / 1000.0
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Check if there's pending work (animation or pending delta)
    /// Use this to determine if we need high frame rate
    #[inline]
    pub fn needs_update(&self) -> bool {
        self.animation.is_some() || self.pending_delta != 0.0
    }

    /// Final offset once the running animation completes
    pub fn target(&self) -> f64 {
        self.animation
            .as_ref()
            .map(|a| a.to)
            .unwrap_or(self.current)
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Set offset immediately (no animation)
    pub fn set_offset(&mut self, offset: f64) {
        self.animation = None;
        self.current = offset;
        self.pending_delta = 0.0;
    }

    /// Animate towards an absolute offset
    pub fn scroll_to(&mut self, target: f64, max_offset: f64) {
        let target = target.clamp(0.0, max_offset.max(0.0));
        self.pending_delta = 0.0;

        if !self.is_smooth() {
            self.current = target;
            self.animation = None;
            return;
        }
        self.start(target);
    }

    /// Scroll by a delta in pixels (positive = down)
    ///
    /// Deltas arriving before the next `update()` are batched.
    pub fn scroll_by(&mut self, delta: f64) {
        self.pending_delta += delta;
    }

    fn start(&mut self, target: f64) {
        if target == self.current {
            self.animation = None;
            return;
        }
        self.animation = Some(ActiveAnimation {
            elapsed: 0.0,
            from: self.current,
            to: target,
            duration: self.duration_secs(),
            easing: self.config.easing,
        });
    }

    /// Advance by `dt` seconds and return the current offset
    pub fn update(&mut self, dt: f64, max_offset: f64) -> f64 {
        let max_offset = max_offset.max(0.0);

        if self.pending_delta != 0.0 {
            let target = (self.target() + self.pending_delta).clamp(0.0, max_offset);
            self.pending_delta = 0.0;
            if self.is_smooth() {
                self.start(target);
                // The key press lands on this frame; motion starts next frame
                return self.current;
            }
            self.current = target;
            self.animation = None;
        }

        if let Some(anim) = self.animation.as_mut() {
            anim.elapsed += dt.max(0.0);
            if is_complete(anim.elapsed, 0.0, anim.duration) {
                self.current = anim.to.min(max_offset);
                self.animation = None;
            } else {
                let t = anim.easing.apply(progress(anim.elapsed, 0.0, anim.duration));
                self.current = lerp(anim.from, anim.to, t).min(max_offset);
            }
        }

        self.current
    }

    /// Stop at the current offset
    pub fn cancel(&mut self) {
        self.animation = None;
        self.pending_delta = 0.0;
    }

    pub fn reset(&mut self) {
        self.set_offset(0.0);
    }
}
