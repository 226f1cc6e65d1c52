//! L3 Molecular Layer: Repeating keyframe animations
//!
//! Ambient motion that runs regardless of scroll: pulsing badges, floating
//! blobs, wiggling icons. A [`KeyframeLoop`] spreads its keyframes evenly over
//! `duration`, eases every segment with the same curve and repeats forever,
//! waiting `repeat_delay` between cycles. Time comes from the owning
//! composition's fixed-step clock.

use serde::{Deserialize, Serialize};

use super::easing::EasingType;
use super::mapping::Unit;
use super::timing::lerp;
use crate::{Error, Result};

/// What happens at the end of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatType {
    /// Restart from the first keyframe
    #[default]
    Loop,
    /// Play the keyframes backwards on every other cycle
    Reverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeLoop {
    pub id: String,
    pub keyframes: Vec<f64>,
    pub unit: Unit,
    /// Length of one cycle in seconds
    pub duration: f64,
    /// Wait before the first cycle
    pub delay: f64,
    /// Pause between cycles
    pub repeat_delay: f64,
    pub repeat_type: RepeatType,
    pub easing: EasingType,
}

impl KeyframeLoop {
    pub fn new(id: impl Into<String>, keyframes: Vec<f64>, duration: f64) -> Self {
        Self {
            id: id.into(),
            keyframes,
            unit: Unit::None,
            duration,
            delay: 0.0,
            repeat_delay: 0.0,
            repeat_type: RepeatType::Loop,
            easing: EasingType::EaseInOut,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_repeat_delay(mut self, repeat_delay: f64) -> Self {
        self.repeat_delay = repeat_delay;
        self
    }

    pub fn with_repeat_type(mut self, repeat_type: RepeatType) -> Self {
        self.repeat_type = repeat_type;
        self
    }

    pub fn with_easing(mut self, easing: EasingType) -> Self {
        self.easing = easing;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.keyframes.len() < 2 {
            return Err(Error::InvalidMapping(format!(
                "loop '{}' needs at least two keyframes, got {}",
                self.id,
                self.keyframes.len()
            )));
        }
        if self.keyframes.iter().any(|k| !k.is_finite()) {
            return Err(Error::InvalidMapping(format!(
                "loop '{}' has a non-finite keyframe",
                self.id
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(Error::InvalidMapping(format!(
                "loop '{}' duration must be positive, got {}",
                self.id, self.duration
            )));
        }
        for (name, value) in [("delay", self.delay), ("repeat delay", self.repeat_delay)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidMapping(format!(
                    "loop '{}' {} must be a non-negative number, got {}",
                    self.id, name, value
                )));
            }
        }
        Ok(())
    }

    /// Value `elapsed` seconds after the loop started
    pub fn sample(&self, elapsed: f64) -> f64 {
        let Some(first) = self.keyframes.first().copied() else {
            return 0.0;
        };
        let active = elapsed - self.delay;
        if active.is_nan() || active <= 0.0 {
            return first;
        }

        let period = self.duration + self.repeat_delay;
        let cycle = (active / period).floor();
        let phase = active - cycle * period;
        let mut t = (phase / self.duration).min(1.0);
        if self.repeat_type == RepeatType::Reverse && cycle % 2.0 == 1.0 {
            t = 1.0 - t;
        }
        self.at(t)
    }

    /// Value at normalized cycle position `t`
    fn at(&self, t: f64) -> f64 {
        let segments = self.keyframes.len().saturating_sub(1);
        if segments == 0 {
            return self.keyframes.first().copied().unwrap_or(0.0);
        }
        let position = t.clamp(0.0, 1.0) * segments as f64;
        let index = (position.floor() as usize).min(segments - 1);
        let local = self.easing.apply(position - index as f64);
        lerp(self.keyframes[index], self.keyframes[index + 1], local)
    }
}

/// A mounted loop and the clock time it started at
#[derive(Debug, Clone)]
pub struct LoopTrack {
    animation: KeyframeLoop,
    start: f64,
}

impl LoopTrack {
    pub fn start(animation: KeyframeLoop, now: f64) -> Result<Self> {
        animation.validate()?;
        Ok(Self {
            animation,
            start: now,
        })
    }

    pub fn animation(&self) -> &KeyframeLoop {
        &self.animation
    }

    #[inline]
    pub fn sample(&self, now: f64) -> f64 {
        self.animation.sample(now - self.start)
    }
}
