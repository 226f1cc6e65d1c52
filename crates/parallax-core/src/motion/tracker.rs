//! L3 Molecular Layer: Scroll progress tracking
//!
//! A [`ScrollTracker`] listens to the host's scroll, resize and layout
//! notifications and keeps a normalized progress value for one observation
//! window. Listeners are released when the tracker is dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::host::{ElementId, ElementRect, EventKind, HostBus, HostEvent, Subscription, Viewport};
use super::timing::clamp01;
use crate::{Error, Result};

/// Where a target edge meets a container edge, e.g. `"start end"`
///
/// Both values are fractions: 0 is the start (top) edge, 1 the end (bottom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOffset {
    pub target: f64,
    pub container: f64,
}

impl ScrollOffset {
    pub const START_END: Self = Self::new(0.0, 1.0);
    pub const END_START: Self = Self::new(1.0, 0.0);
    pub const START_START: Self = Self::new(0.0, 0.0);
    pub const END_END: Self = Self::new(1.0, 1.0);

    pub const fn new(target: f64, container: f64) -> Self {
        Self { target, container }
    }

    /// Scroll offset at which this intersection happens
    pub fn resolve(&self, rect: ElementRect, viewport_height: f64) -> f64 {
        rect.top + self.target * rect.height - self.container * viewport_height
    }
}

fn parse_edge(token: &str) -> Option<f64> {
    match token {
        "start" => Some(0.0),
        "center" => Some(0.5),
        "end" => Some(1.0),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

impl FromStr for ScrollOffset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let edges: Option<Vec<f64>> = tokens.iter().map(|t| parse_edge(t)).collect();
        match edges.as_deref() {
            Some([both]) => Ok(Self::new(*both, *both)),
            Some([target, container]) => Ok(Self::new(*target, *container)),
            _ => Err(Error::InvalidWindow(format!("cannot parse scroll offset '{}'", s))),
        }
    }
}

impl fmt::Display for ScrollOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn edge(v: f64) -> String {
            match v {
                v if v == 0.0 => "start".to_string(),
                v if v == 0.5 => "center".to_string(),
                v if v == 1.0 => "end".to_string(),
                v => v.to_string(),
            }
        }
        write!(f, "{} {}", edge(self.target), edge(self.container))
    }
}

impl Serialize for ScrollOffset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScrollOffset {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn default_element_offsets() -> [ScrollOffset; 2] {
    [ScrollOffset::START_END, ScrollOffset::END_START]
}

/// Scroll range over which progress goes from 0 to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ObservationWindow {
    /// Explicit start/end scroll offsets
    Range { start: f64, end: f64 },
    /// The whole scrollable document
    Document,
    /// While an element passes through the viewport
    Element {
        element: ElementId,
        #[serde(default = "default_element_offsets")]
        offset: [ScrollOffset; 2],
    },
}

impl ObservationWindow {
    /// Element window with the default `["start end", "end start"]` offsets
    pub fn element(element: impl Into<ElementId>) -> Self {
        ObservationWindow::Element {
            element: element.into(),
            offset: default_element_offsets(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ObservationWindow::Range { start, end } if !start.is_finite() || !end.is_finite() => {
                Err(Error::InvalidWindow(format!(
                    "range {}..{} is not finite",
                    start, end
                )))
            }
            ObservationWindow::Element { offset, .. }
                if offset
                    .iter()
                    .any(|o| !o.target.is_finite() || !o.container.is_finite()) =>
            {
                Err(Error::InvalidWindow("element offsets must be finite".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Latest scroll sample for one observation window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScrollState {
    pub raw_offset: f64,
    /// Length of the observation window (`end - start`)
    pub extent: f64,
    /// Normalized position in [0, 1]
    pub progress: f64,
}

struct TrackerInner {
    window: ObservationWindow,
    viewport: Viewport,
    target_rect: Option<ElementRect>,
    state: ScrollState,
    notifications: u64,
}

impl TrackerInner {
    fn bounds(&self) -> Option<(f64, f64)> {
        match &self.window {
            ObservationWindow::Range { start, end } => Some((*start, *end)),
            ObservationWindow::Document => Some((0.0, self.viewport.max_offset())),
            ObservationWindow::Element { offset, .. } => self.target_rect.map(|rect| {
                (
                    offset[0].resolve(rect, self.viewport.height),
                    offset[1].resolve(rect, self.viewport.height),
                )
            }),
        }
    }

    fn recompute(&mut self) {
        let raw_offset = self.viewport.offset;
        self.state = match self.bounds() {
            Some((start, end)) => {
                let extent = end - start;
                // Zero-length window reads as constant 0
                let progress = if extent == 0.0 || !extent.is_finite() {
                    0.0
                } else {
                    clamp01((raw_offset - start) / extent)
                };
                ScrollState {
                    raw_offset,
                    extent,
                    progress,
                }
            }
            None => ScrollState {
                raw_offset,
                extent: 0.0,
                progress: 0.0,
            },
        };
    }

    fn handle(&mut self, event: &HostEvent) {
        match event {
            HostEvent::Scroll { offset } if offset.is_finite() => self.viewport.offset = *offset,
            HostEvent::Resize {
                viewport_height,
                content_height,
            } => {
                if viewport_height.is_finite() {
                    self.viewport.height = viewport_height.max(0.0);
                }
                if content_height.is_finite() {
                    self.viewport.content_height = content_height.max(0.0);
                }
            }
            HostEvent::Layout { element, rect } => match &self.window {
                ObservationWindow::Element { element: target, .. } if target == element => {
                    self.target_rect = Some(*rect);
                }
                _ => return,
            },
            HostEvent::Removed { element } => match &self.window {
                ObservationWindow::Element { element: target, .. } if target == element => {
                    self.target_rect = None;
                }
                _ => return,
            },
            _ => return,
        }
        self.notifications += 1;
        self.recompute();
    }
}

/// Normalized scroll progress for one observation window
pub struct ScrollTracker {
    inner: Rc<RefCell<TrackerInner>>,
    _subscriptions: Vec<Subscription>,
}

impl ScrollTracker {
    /// Start observing `window` on `bus`
    ///
    /// Starts from the bus's current viewport, so a tracker created after
    /// the page has already scrolled reports the right progress immediately.
    pub fn attach(bus: &HostBus, window: ObservationWindow) -> Result<Self> {
        window.validate()?;

        let mut inner = TrackerInner {
            window,
            viewport: bus.viewport(),
            target_rect: None,
            state: ScrollState::default(),
            notifications: 0,
        };
        inner.recompute();
        let inner = Rc::new(RefCell::new(inner));

        let subscriptions = [
            EventKind::Scroll,
            EventKind::Resize,
            EventKind::Layout,
            EventKind::Removed,
        ]
        .into_iter()
        .map(|kind| {
            let weak: Weak<RefCell<TrackerInner>> = Rc::downgrade(&inner);
            bus.subscribe(kind, move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().handle(event);
                }
            })
        })
        .collect();

        tracing::debug!("Scroll tracker attached to {:?}", inner.borrow().window);

        Ok(Self {
            inner,
            _subscriptions: subscriptions,
        })
    }

    /// Current progress in [0, 1]
    #[inline]
    pub fn progress(&self) -> f64 {
        self.inner.borrow().state.progress
    }

    /// Current scroll sample
    pub fn state(&self) -> ScrollState {
        self.inner.borrow().state
    }

    pub fn window(&self) -> ObservationWindow {
        self.inner.borrow().window.clone()
    }

    /// Number of host notifications that changed this tracker
    pub fn notifications(&self) -> u64 {
        self.inner.borrow().notifications
    }

    /// Provide the target rect directly (hosts without layout events)
    pub fn set_target_rect(&self, rect: ElementRect) {
        let mut inner = self.inner.borrow_mut();
        inner.target_rect = Some(rect);
        inner.recompute();
    }

    /// Stop observing; equivalent to dropping the tracker
    pub fn detach(self) {}
}

impl Drop for ScrollTracker {
    fn drop(&mut self) {
        tracing::debug!("Scroll tracker detached");
    }
}

/// Create a tracker over `window` on the host `bus`
pub fn create_scroll_tracker(bus: &HostBus, window: ObservationWindow) -> Result<ScrollTracker> {
    ScrollTracker::attach(bus, window)
}
