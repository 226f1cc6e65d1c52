//! L3 Molecular Layer: Host event bus
//!
//! Stands in for the window/document the engine is mounted on. The host
//! dispatches scroll, resize, layout and intersection notifications; engine
//! components subscribe per [`EventKind`] and hold a [`Subscription`] guard
//! that deregisters the listener when dropped.
//!
//! Everything here is single-threaded: the bus is `Rc`-shared and listeners
//! run synchronously inside [`HostBus::dispatch`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

/// Identifier of an observed element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::borrow::Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Vertical placement of an element in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementRect {
    pub top: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Latest scroll geometry reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Current scroll offset
    pub offset: f64,
    /// Visible height
    pub height: f64,
    /// Total scrollable content height
    pub content_height: f64,
}

impl Viewport {
    /// Largest reachable scroll offset
    pub fn max_offset(&self) -> f64 {
        (self.content_height - self.height).max(0.0)
    }
}

/// Notification dispatched by the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Scroll { offset: f64 },
    Resize { viewport_height: f64, content_height: f64 },
    Layout { element: ElementId, rect: ElementRect },
    Intersection { element: ElementId, ratio: f64 },
    Removed { element: ElementId },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Scroll { .. } => EventKind::Scroll,
            HostEvent::Resize { .. } => EventKind::Resize,
            HostEvent::Layout { .. } => EventKind::Layout,
            HostEvent::Intersection { .. } => EventKind::Intersection,
            HostEvent::Removed { .. } => EventKind::Removed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Scroll,
    Resize,
    Layout,
    Intersection,
    Removed,
}

type Listener = Box<dyn FnMut(&HostEvent)>;

struct Registered {
    id: u64,
    kind: EventKind,
    /// Taken out while the listener runs
    listener: Option<Listener>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: Vec<Registered>,
    viewport: Viewport,
}

/// Single-threaded host event bus
#[derive(Clone, Default)]
pub struct HostBus {
    state: Rc<RefCell<BusState>>,
}

impl HostBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that already knows its viewport geometry
    pub fn with_viewport(viewport: Viewport) -> Self {
        let bus = Self::default();
        bus.state.borrow_mut().viewport = viewport;
        bus
    }

    /// Current scroll geometry
    pub fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Register `listener` for events of `kind`
    ///
    /// The listener stays registered for as long as the returned guard lives.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: FnMut(&HostEvent) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push(Registered {
            id,
            kind,
            listener: Some(Box::new(listener)),
        });
        tracing::trace!("Listener {} subscribed to {:?}", id, kind);

        Subscription {
            id,
            bus: Rc::downgrade(&self.state),
        }
    }

    /// Deliver `event` to every listener registered for its kind
    ///
    /// Listeners may subscribe or drop subscriptions while running; listeners
    /// added during a dispatch first see the next event.
    pub fn dispatch(&self, event: HostEvent) {
        let kind = event.kind();
        let ids: Vec<u64> = {
            let mut state = self.state.borrow_mut();
            apply_geometry(&mut state.viewport, &event);
            state
                .listeners
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.id)
                .collect()
        };

        for id in ids {
            let taken = {
                let mut state = self.state.borrow_mut();
                state
                    .listeners
                    .iter_mut()
                    .find(|r| r.id == id)
                    .and_then(|r| r.listener.take())
            };
            let Some(mut listener) = taken else {
                continue;
            };

            listener(&event);

            // Unsubscribed while running: drop it outside the borrow
            let orphaned = {
                let mut state = self.state.borrow_mut();
                match state.listeners.iter_mut().find(|r| r.id == id) {
                    Some(slot) => {
                        slot.listener = Some(listener);
                        None
                    }
                    None => Some(listener),
                }
            };
            drop(orphaned);
        }
    }
}

pub(crate) fn apply_geometry(viewport: &mut Viewport, event: &HostEvent) {
    match event {
        HostEvent::Scroll { offset } if offset.is_finite() => viewport.offset = *offset,
        HostEvent::Resize {
            viewport_height,
            content_height,
        } => {
            if viewport_height.is_finite() {
                viewport.height = viewport_height.max(0.0);
            }
            if content_height.is_finite() {
                viewport.content_height = content_height.max(0.0);
            }
        }
        _ => {}
    }
}

/// Guard for a registered listener; dropping it deregisters the listener
pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<BusState>>,
}

impl Subscription {
    /// True while both the bus and the registration are alive
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .map(|state| state.borrow().listeners.iter().any(|r| r.id == self.id))
            .unwrap_or(false)
    }

    /// Deregister now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.bus.upgrade() else {
            return;
        };
        let removed = {
            let mut state = state.borrow_mut();
            state
                .listeners
                .iter()
                .position(|r| r.id == self.id)
                .map(|idx| state.listeners.remove(idx))
        };
        if removed.is_some() {
            tracing::trace!("Listener {} unsubscribed", self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
