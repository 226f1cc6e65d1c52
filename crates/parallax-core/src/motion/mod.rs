//! Scroll-linked motion composition engine
//!
//! Tracks how far a region has been scrolled, smooths that signal with a spring,
//! fans it out to visual channels through breakpoint mappings, and latches
//! one-shot reveal triggers with staggered entrance transitions. Ambient
//! keyframe loops run alongside on the same frame clock.
//!
//! # Architecture
//!
//! ## L4 Atomic Layer
//! - `easing` - Pure easing curves
//! - `timing` - Interpolation helpers and the fixed-step frame clock
//! - `mapping` - Piecewise-linear breakpoint mappings
//! - `stagger` - Per-child delay plans
//!
//! ## L3 Molecular Layer
//! - `host` - Host event bus with scoped listener subscriptions
//! - `tracker` - Scroll progress over an observation window
//! - `spring` - Spring-damper smoothing
//! - `reveal` - Per-element viewport reveal state machine
//! - `transition` - Tweens driven by reveal edges
//! - `keyframes` - Repeating keyframe loops on the frame clock
//!
//! ## L2 Organism Layer
//! - `composition` - Per-page orchestrator publishing one snapshot per frame
//! - `registry` - Arena of mounted compositions keyed by session
//!
//! # Usage
//!
//! ```ignore
//! use parallax_core::motion::{Channel, CompositionRoot, HostBus, HostEvent, Mapping, ObservationWindow};
//!
//! let bus = HostBus::new();
//! let mut root = CompositionRoot::new(&bus, ObservationWindow::Document, &config)?;
//! root.add_channel(Channel::new("hero.y", Mapping::new(vec![(0.0, 0.0), (0.3, -50.0)])?))?;
//!
//! bus.dispatch(HostEvent::Scroll { offset: 120.0 });
//! let snapshot = root.tick(1.0 / 60.0);
//! let y = snapshot.value("hero.y");
//! ```

// L4 Atomic Layer
pub mod easing;
pub mod mapping;
pub mod stagger;
pub mod timing;

// L3 Molecular Layer
pub mod host;
pub mod keyframes;
pub mod reveal;
pub mod spring;
pub mod tracker;
pub mod transition;

// L2 Organism Layer
pub mod composition;
pub mod registry;

pub use composition::{Channel, ChannelSource, CompositionRoot, EventProbe, FrameSnapshot, StaggerGroup};
pub use host::{ElementId, ElementRect, EventKind, HostBus, HostEvent, Subscription, Viewport};
pub use keyframes::{KeyframeLoop, LoopTrack, RepeatType};
pub use mapping::{map_range, Mapping, Unit};
pub use registry::{MotionRegistry, SessionId};
pub use reveal::{
    intersection_ratio, observe_reveal, RevealController, RevealEdge, RevealEntry, RevealOptions,
    RevealPhase,
};
pub use spring::{create_spring, SpringParams, SpringSmoother, SpringState};
pub use stagger::{stagger, StaggerPlan};
pub use timing::FrameClock;
pub use tracker::{
    create_scroll_tracker, ObservationWindow, ScrollOffset, ScrollState, ScrollTracker,
};
pub use transition::{Transition, TransitionTrack, Tween};
