//! L3 Molecular Layer: Viewport reveal state machine
//!
//! Each observed element moves through:
//!
//! ```text
//! Unseen --ratio crosses threshold--> Visible --next notification--> Latched   (restartable = false)
//!   ^                                    |
//!   +---------ratio drops below----------+                                     (restartable = true)
//! ```
//!
//! Crossings are edge-triggered: repeated notifications above the threshold
//! report no new edge, so entrance animations play once per qualifying pass
//! (or once ever for non-restartable entries).

use serde::{Deserialize, Serialize};

use super::host::{ElementId, ElementRect, Viewport};
use super::timing::clamp01;
use super::transition::Transition;
use crate::config::RevealConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealPhase {
    Unseen,
    Visible,
    /// Terminal; only reached by non-restartable entries
    Latched,
}

/// Transition reported by one intersection notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealEdge {
    None,
    /// Just became visible
    Rising,
    /// Restartable entry just left the viewport
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealOptions {
    /// Visible fraction to reach; 0 means any visible pixel
    pub threshold: f64,
    pub restartable: bool,
    /// Grows (positive) or shrinks (negative) the viewport before intersecting
    pub margin_px: f64,
    pub transition: Transition,
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self::from(&RevealConfig::default())
    }
}

impl From<&RevealConfig> for RevealOptions {
    fn from(config: &RevealConfig) -> Self {
        Self {
            threshold: config.threshold,
            restartable: !config.once,
            margin_px: config.margin_px,
            transition: Transition::from(config),
        }
    }
}

impl RevealOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidReveal(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !self.margin_px.is_finite() {
            return Err(Error::InvalidReveal("margin must be finite".to_string()));
        }
        self.transition.validate()
    }

    /// Whether `ratio` counts as intersecting
    #[inline]
    pub fn is_intersecting(&self, ratio: f64) -> bool {
        if self.threshold == 0.0 {
            ratio > 0.0
        } else {
            ratio >= self.threshold
        }
    }
}

/// Reveal state of one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevealEntry {
    element_id: ElementId,
    visible: bool,
    has_fired: bool,
    restartable: bool,
    phase: RevealPhase,
    last_ratio: f64,
}

impl RevealEntry {
    pub fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    #[inline]
    pub fn visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn has_fired(&self) -> bool {
        self.has_fired
    }

    pub fn restartable(&self) -> bool {
        self.restartable
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn last_ratio(&self) -> f64 {
        self.last_ratio
    }
}

/// Intersection watcher for one element
#[derive(Debug, Clone)]
pub struct RevealController {
    options: RevealOptions,
    entry: RevealEntry,
}

impl RevealController {
    pub fn new(element: impl Into<ElementId>, options: RevealOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            entry: RevealEntry {
                element_id: element.into(),
                visible: false,
                has_fired: false,
                restartable: options.restartable,
                phase: RevealPhase::Unseen,
                last_ratio: 0.0,
            },
            options,
        })
    }

    pub fn entry(&self) -> &RevealEntry {
        &self.entry
    }

    pub fn options(&self) -> &RevealOptions {
        &self.options
    }

    /// Feed a new intersection ratio and report the edge it caused
    pub fn on_intersection_change(&mut self, ratio: f64) -> RevealEdge {
        let ratio = clamp01(ratio);
        let entry = &mut self.entry;

        match entry.phase {
            RevealPhase::Latched => RevealEdge::None,
            RevealPhase::Visible if !entry.restartable => {
                entry.phase = RevealPhase::Latched;
                entry.last_ratio = ratio;
                RevealEdge::None
            }
            phase => {
                entry.last_ratio = ratio;
                let intersecting = self.options.is_intersecting(ratio);
                match (phase, intersecting) {
                    (RevealPhase::Unseen, true) => {
                        entry.phase = RevealPhase::Visible;
                        entry.visible = true;
                        entry.has_fired = true;
                        RevealEdge::Rising
                    }
                    (RevealPhase::Visible, false) => {
                        entry.phase = RevealPhase::Unseen;
                        entry.visible = false;
                        RevealEdge::Falling
                    }
                    _ => RevealEdge::None,
                }
            }
        }
    }
}

/// Register `element` for reveal observation with `options`
pub fn observe_reveal(element: impl Into<ElementId>, options: RevealOptions) -> Result<RevealController> {
    RevealController::new(element, options)
}

/// Visible fraction of `rect` inside the viewport grown by `margin_px`
///
/// Zero-height elements count as fully visible when they sit inside the
/// viewport.
pub fn intersection_ratio(rect: ElementRect, viewport: Viewport, margin_px: f64) -> f64 {
    let top = viewport.offset - margin_px;
    let bottom = viewport.offset + viewport.height + margin_px;
    if bottom <= top {
        return 0.0;
    }

    if rect.height <= 0.0 {
        return if rect.top >= top && rect.top <= bottom {
            1.0
        } else {
            0.0
        };
    }

    let visible = rect.bottom().min(bottom) - rect.top.max(top);
    clamp01(visible / rect.height)
}
