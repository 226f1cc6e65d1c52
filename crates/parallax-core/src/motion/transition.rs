//! L3 Molecular Layer: Reveal transitions
//!
//! When an element reveals, its entrance animation runs as a [`Tween`] on the
//! composition's fixed-step clock. A [`TransitionTrack`] owns the tween for one
//! element and can reverse it when a restartable element leaves the viewport.

use serde::{Deserialize, Serialize};

use super::easing::EasingType;
use super::timing::{is_complete, lerp, progress};
use crate::config::RevealConfig;
use crate::{Error, Result};

/// Timing of an entrance animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default)]
    pub delay: f64,
    pub duration: f64,
    #[serde(default)]
    pub easing: EasingType,
}

impl Default for Transition {
    fn default() -> Self {
        Self::from(&RevealConfig::default())
    }
}

impl From<&RevealConfig> for Transition {
    fn from(config: &RevealConfig) -> Self {
        Self {
            delay: 0.0,
            duration: config.duration_secs,
            easing: config.easing,
        }
    }
}

impl Transition {
    pub fn validate(&self) -> Result<()> {
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(Error::InvalidReveal(format!(
                "transition delay must be a non-negative number, got {}",
                self.delay
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::InvalidReveal(format!(
                "transition duration must be a non-negative number, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

/// One running interpolation from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    /// Clock time the tween was started at
    pub start: f64,
    pub delay: f64,
    pub duration: f64,
    pub easing: EasingType,
}

impl Tween {
    /// Value at clock time `now`
    pub fn sample(&self, now: f64) -> f64 {
        let t = progress(now - self.start, self.delay, self.duration);
        lerp(self.from, self.to, self.easing.apply(t))
    }

    pub fn is_complete(&self, now: f64) -> bool {
        is_complete(now - self.start, self.delay, self.duration)
    }
}

/// Entrance progress of one element, 0 = initial pose, 1 = fully revealed
#[derive(Debug, Clone, Default)]
pub struct TransitionTrack {
    value: f64,
    tween: Option<Tween>,
}

impl TransitionTrack {
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_running(&self) -> bool {
        self.tween.is_some()
    }

    /// Start animating towards 1 after `delay` seconds
    pub fn show(&mut self, now: f64, transition: &Transition, delay: f64) {
        self.tween = Some(Tween {
            from: self.value,
            to: 1.0,
            start: now,
            delay,
            duration: transition.duration,
            easing: transition.easing,
        });
    }

    /// Animate back to 0 without delay
    pub fn hide(&mut self, now: f64, transition: &Transition) {
        self.tween = Some(Tween {
            from: self.value,
            to: 0.0,
            start: now,
            delay: 0.0,
            duration: transition.duration,
            easing: transition.easing,
        });
    }

    /// Advance to clock time `now` and return the current value
    pub fn sample(&mut self, now: f64) -> f64 {
        if let Some(tween) = self.tween {
            self.value = tween.sample(now);
            if tween.is_complete(now) {
                self.value = tween.to;
                self.tween = None;
            }
        }
        self.value
    }
}
