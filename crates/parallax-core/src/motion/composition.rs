//! L2 Organism Layer: Per-page motion composition
//!
//! A [`CompositionRoot`] owns one scroll tracker, the springs and mappings
//! that fan progress out to visual channels, and the reveal/stagger state of
//! its subtree. [`CompositionRoot::tick`] runs once per animation frame and
//! publishes a single [`FrameSnapshot`]; every value in it comes from the same
//! scroll sample. Keyframe loops registered on the root run on the same
//! fixed-step clock as entrance transitions.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use serde::Serialize;

use super::host::{
    apply_geometry, ElementId, ElementRect, EventKind, HostBus, HostEvent, Subscription, Viewport,
};
use super::keyframes::{KeyframeLoop, LoopTrack};
use super::mapping::{Mapping, Unit};
use super::reveal::{intersection_ratio, RevealController, RevealEdge, RevealEntry, RevealOptions};
use super::spring::{SpringParams, SpringSmoother};
use super::stagger::StaggerPlan;
use super::tracker::{ObservationWindow, ScrollState, ScrollTracker};
use super::transition::TransitionTrack;
use crate::config::AppConfig;
use crate::{Error, Result};

/// What a channel's mapping reads as input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelSource {
    /// The root's shared spring-smoothed progress
    Smoothed,
    /// Unsmoothed progress
    Raw,
    /// A dedicated spring with its own constants
    Spring(SpringParams),
}

/// One derived visual parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub mapping: Mapping,
    pub unit: Unit,
    pub source: ChannelSource,
}

impl Channel {
    pub fn new(id: impl Into<String>, mapping: Mapping) -> Self {
        Self {
            id: id.into(),
            mapping,
            unit: Unit::None,
            source: ChannelSource::Smoothed,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn raw(mut self) -> Self {
        self.source = ChannelSource::Raw;
        self
    }

    pub fn with_spring(mut self, params: SpringParams) -> Self {
        self.source = ChannelSource::Spring(params);
        self
    }
}

/// Children that enter one after another once `parent` reveals
#[derive(Debug, Clone, PartialEq)]
pub struct StaggerGroup {
    pub parent: ElementId,
    pub children: Vec<ElementId>,
    pub base_delay: f64,
    pub increment: f64,
}

impl StaggerGroup {
    pub fn plan(&self) -> StaggerPlan {
        StaggerPlan::new(self.children.len(), self.base_delay, self.increment)
    }
}

/// Everything the view layer reads for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    /// Accumulated clock time in seconds
    pub time: f64,
    pub scroll: ScrollState,
    pub progress: f64,
    pub smoothed: f64,
    pub derived_values: BTreeMap<String, f64>,
    pub reveal_flags: BTreeMap<ElementId, bool>,
    /// Elements whose reveal fired this frame
    pub just_revealed: BTreeSet<ElementId>,
    pub stagger_delays: BTreeMap<ElementId, f64>,
    /// Entrance progress per element, 0 = initial pose, 1 = revealed
    pub transitions: BTreeMap<ElementId, f64>,
    /// Current value of every keyframe loop
    pub loop_values: BTreeMap<String, f64>,
}

impl FrameSnapshot {
    pub fn value(&self, channel: &str) -> Option<f64> {
        self.derived_values.get(channel).copied()
    }

    pub fn is_revealed(&self, element: &str) -> bool {
        self.reveal_flags.get(element).copied().unwrap_or(false)
    }

    pub fn transition(&self, element: &str) -> f64 {
        self.transitions.get(element).copied().unwrap_or(0.0)
    }

    pub fn loop_value(&self, id: &str) -> Option<f64> {
        self.loop_values.get(id).copied()
    }
}

/// Host notifications queued until the next tick
#[derive(Debug, Default)]
struct Pending {
    /// Rects with the viewport current when they were reported
    layouts: Vec<(ElementId, ElementRect, Viewport)>,
    intersections: Vec<(ElementId, f64)>,
    removed: Vec<ElementId>,
}

#[derive(Debug, Default)]
struct Inbox {
    /// Every notification delivered to this root, queued or not
    received: u64,
    /// Host geometry as of the last delivered notification
    viewport: Viewport,
    pending: Pending,
}

/// Read-only view of a root's notification count that survives teardown
#[derive(Debug, Clone)]
pub struct EventProbe {
    inbox: Rc<RefCell<Inbox>>,
}

impl EventProbe {
    /// Host notifications delivered to the root so far
    pub fn received(&self) -> u64 {
        self.inbox.borrow().received
    }
}

struct ChannelSlot {
    channel: Channel,
    spring: Option<SpringSmoother>,
}

struct RevealSlot {
    controller: RevealController,
    /// Ratios from explicit intersection events, oldest first
    pending: Vec<f64>,
}

/// Per-page motion orchestrator
pub struct CompositionRoot {
    bus: HostBus,
    tracker: ScrollTracker,
    smoother: SpringSmoother,
    spring_params: SpringParams,
    channels: Vec<ChannelSlot>,
    reveals: BTreeMap<ElementId, RevealSlot>,
    groups: BTreeMap<ElementId, StaggerGroup>,
    tracks: BTreeMap<ElementId, TransitionTrack>,
    rects: HashMap<ElementId, ElementRect>,
    loops: Vec<LoopTrack>,
    /// Rising edges seen outside a tick, published with the next frame
    early_reveals: BTreeSet<ElementId>,
    reveal_defaults: RevealOptions,
    inbox: Rc<RefCell<Inbox>>,
    _subscriptions: Vec<Subscription>,
    clock: f64,
    snapshot: FrameSnapshot,
}

impl CompositionRoot {
    /// Mount a composition observing `window` on `bus`
    pub fn new(bus: &HostBus, window: ObservationWindow, config: &AppConfig) -> Result<Self> {
        let spring_params = SpringParams::from(&config.spring);
        let tracker = ScrollTracker::attach(bus, window)?;
        let smoother = SpringSmoother::with_value(spring_params, tracker.progress())?;

        let inbox = Rc::new(RefCell::new(Inbox {
            viewport: bus.viewport(),
            ..Inbox::default()
        }));
        let subscriptions = [
            EventKind::Scroll,
            EventKind::Resize,
            EventKind::Layout,
            EventKind::Intersection,
            EventKind::Removed,
        ]
        .into_iter()
            .map(|kind| {
                let weak: Weak<RefCell<Inbox>> = Rc::downgrade(&inbox);
                bus.subscribe(kind, move |event| {
                    if let Some(inbox) = weak.upgrade() {
                        enqueue(&mut inbox.borrow_mut(), event);
                    }
                })
            })
            .collect();

        let mut root = Self {
            bus: bus.clone(),
            tracker,
            smoother,
            spring_params,
            channels: Vec::new(),
            reveals: BTreeMap::new(),
            groups: BTreeMap::new(),
            tracks: BTreeMap::new(),
            rects: HashMap::new(),
            loops: Vec::new(),
            early_reveals: BTreeSet::new(),
            reveal_defaults: RevealOptions::from(&config.reveal),
            inbox,
            _subscriptions: subscriptions,
            clock: 0.0,
            snapshot: FrameSnapshot::default(),
        };
        let sample = root.tracker.state();
        let smoothed = root.smoother.value();
        root.snapshot = root.compose(sample, smoothed, BTreeSet::new(), 0);

        tracing::debug!("Composition mounted on {:?}", root.tracker.window());
        Ok(root)
    }

    /// Reveal options used when a caller doesn't bring its own
    pub fn reveal_defaults(&self) -> RevealOptions {
        self.reveal_defaults
    }

    /// Register a derived channel
    pub fn add_channel(&mut self, channel: Channel) -> Result<()> {
        let result = self.try_add_channel(channel.clone());
        if let Err(e) = &result {
            tracing::warn!("Refusing channel '{}': {}", channel.id, e);
        }
        result
    }

    fn try_add_channel(&mut self, channel: Channel) -> Result<()> {
        if self.channels.iter().any(|slot| slot.channel.id == channel.id) {
            return Err(Error::DuplicateId(channel.id));
        }

        let spring = match channel.source {
            ChannelSource::Spring(params) => {
                Some(SpringSmoother::with_value(params, self.tracker.progress())?)
            }
            _ => None,
        };

        tracing::debug!("Channel '{}' registered ({})", channel.id, channel.unit);
        let value = channel.mapping.evaluate(self.smoother.value());
        self.snapshot.derived_values.insert(channel.id.clone(), value);
        self.channels.push(ChannelSlot { channel, spring });
        Ok(())
    }

    pub fn remove_channel(&mut self, id: &str) -> bool {
        let before = self.channels.len();
        self.channels.retain(|slot| slot.channel.id != id);
        self.snapshot.derived_values.remove(id);
        before != self.channels.len()
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .map(|slot| &slot.channel)
            .find(|channel| channel.id == id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().map(|slot| &slot.channel)
    }

    /// Start a repeating keyframe animation at the current clock time
    pub fn add_loop(&mut self, animation: KeyframeLoop) -> Result<()> {
        let id = animation.id.clone();
        let result = self.try_add_loop(animation);
        if let Err(e) = &result {
            tracing::warn!("Refusing loop '{}': {}", id, e);
        }
        result
    }

    fn try_add_loop(&mut self, animation: KeyframeLoop) -> Result<()> {
        if self.loops.iter().any(|track| track.animation().id == animation.id) {
            return Err(Error::DuplicateId(animation.id));
        }
        let track = LoopTrack::start(animation, self.clock)?;
        let id = track.animation().id.clone();

        tracing::debug!(
            "Loop '{}' registered ({} keyframes over {}s)",
            id,
            track.animation().keyframes.len(),
            track.animation().duration
        );
        self.snapshot.loop_values.insert(id, track.sample(self.clock));
        self.loops.push(track);
        Ok(())
    }

    pub fn remove_loop(&mut self, id: &str) -> bool {
        let before = self.loops.len();
        self.loops.retain(|track| track.animation().id != id);
        self.snapshot.loop_values.remove(id);
        before != self.loops.len()
    }

    pub fn loops(&self) -> impl Iterator<Item = &KeyframeLoop> {
        self.loops.iter().map(|track| track.animation())
    }

    /// Watch `element` for viewport reveals
    pub fn observe_reveal(
        &mut self,
        element: impl Into<ElementId>,
        options: RevealOptions,
    ) -> Result<()> {
        let element = element.into();
        let result = self.try_observe(element.clone(), options);
        if let Err(e) = &result {
            tracing::warn!("Refusing reveal for '{}': {}", element, e);
        }
        result
    }

    fn try_observe(&mut self, element: ElementId, options: RevealOptions) -> Result<()> {
        if self.reveals.contains_key(&element) || self.is_group_child(&element) {
            return Err(Error::DuplicateId(element.to_string()));
        }
        let controller = RevealController::new(element.clone(), options)?;

        tracing::debug!(
            "Observing '{}' (threshold {}, restartable {})",
            element,
            options.threshold,
            options.restartable
        );
        self.snapshot.reveal_flags.insert(element.clone(), false);
        self.snapshot.transitions.insert(element.clone(), 0.0);
        self.tracks.insert(element.clone(), TransitionTrack::default());
        self.reveals.insert(
            element.clone(),
            RevealSlot {
                controller,
                pending: Vec::new(),
            },
        );

        // Already laid out: in view at mount means revealed at mount
        let viewport = self.bus.viewport();
        self.reveal_now(&element, viewport);
        Ok(())
    }

    /// Stop watching `element`; its stagger group goes with it
    pub fn unobserve(&mut self, element: &str) -> bool {
        let removed = self.reveals.remove(element).is_some();
        if removed {
            self.drop_element(element);
        }
        removed
    }

    pub fn reveal_entry(&self, element: &str) -> Option<&RevealEntry> {
        self.reveals.get(element).map(|slot| slot.controller.entry())
    }

    /// Stagger `group.children` behind the reveal of `group.parent`
    pub fn add_stagger_group(&mut self, group: StaggerGroup) -> Result<()> {
        let parent = group.parent.clone();
        let result = self.try_add_group(group);
        if let Err(e) = &result {
            tracing::warn!("Refusing stagger group '{}': {}", parent, e);
        }
        result
    }

    fn try_add_group(&mut self, group: StaggerGroup) -> Result<()> {
        if !self.reveals.contains_key(&group.parent) {
            return Err(Error::UnknownElement(group.parent.to_string()));
        }
        if self.groups.contains_key(&group.parent) {
            return Err(Error::DuplicateId(group.parent.to_string()));
        }
        if !group.base_delay.is_finite() || !group.increment.is_finite() {
            return Err(Error::InvalidReveal(format!(
                "stagger timing for '{}' must be finite",
                group.parent
            )));
        }
        self.check_children(&group.parent, &group.children)?;

        tracing::debug!(
            "Stagger group '{}' with {} children",
            group.parent,
            group.children.len()
        );
        let parent = group.parent.clone();
        self.groups.insert(parent.clone(), group);
        self.refresh_group(&parent);
        Ok(())
    }

    /// Replace a group's children and recompute its delays
    pub fn set_group_children(&mut self, parent: &str, children: Vec<ElementId>) -> Result<()> {
        if !self.groups.contains_key(parent) {
            return Err(Error::UnknownElement(parent.to_string()));
        }
        let parent_id = ElementId::from(parent);
        self.check_children(&parent_id, &children)?;

        let old = match self.groups.get_mut(parent) {
            Some(group) => std::mem::replace(&mut group.children, children.clone()),
            None => return Err(Error::UnknownElement(parent.to_string())),
        };
        for child in old.iter().filter(|c| !children.contains(c)) {
            self.forget_child(child);
        }
        self.refresh_group(&parent_id);
        Ok(())
    }

    fn check_children(&self, parent: &ElementId, children: &[ElementId]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for child in children {
            let taken_elsewhere = self
                .groups
                .values()
                .any(|g| &g.parent != parent && g.children.contains(child));
            if child == parent
                || self.reveals.contains_key(child)
                || taken_elsewhere
                || !seen.insert(child)
            {
                return Err(Error::DuplicateId(child.to_string()));
            }
        }
        Ok(())
    }

    /// Sync tracks, delays and flags of a group's children with its parent
    ///
    /// Retained children keep their tracks. Children joining a group whose
    /// parent is already visible start entering right away with their delay.
    fn refresh_group(&mut self, parent: &ElementId) {
        let Some(group) = self.groups.get(parent) else {
            return;
        };
        let plan = group.plan();
        let (parent_visible, transition) = match self.reveals.get(parent) {
            Some(slot) => (
                slot.controller.entry().visible(),
                slot.controller.options().transition,
            ),
            None => (false, self.reveal_defaults.transition),
        };

        for (index, child) in group.children.iter().enumerate() {
            let delay = plan.delay(index).unwrap_or(0.0);
            let track = self.tracks.entry(child.clone()).or_insert_with(|| {
                let mut track = TransitionTrack::default();
                if parent_visible {
                    track.show(self.clock, &transition, delay);
                }
                track
            });
            let value = track.value();

            self.snapshot.stagger_delays.insert(child.clone(), delay);
            self.snapshot.reveal_flags.insert(child.clone(), parent_visible);
            self.snapshot.transitions.insert(child.clone(), value);
        }
    }

    fn is_group_child(&self, element: &ElementId) -> bool {
        self.groups.values().any(|g| g.children.contains(element))
    }

    fn forget_child(&mut self, child: &ElementId) {
        self.tracks.remove(child);
        self.snapshot.stagger_delays.remove(child);
        self.snapshot.reveal_flags.remove(child);
        self.snapshot.transitions.remove(child);
    }

    /// Drop every trace of `element` (observed element, group parent or child)
    fn drop_element(&mut self, element: &str) {
        self.reveals.remove(element);
        self.rects.remove(element);
        self.tracks.remove(element);
        self.snapshot.reveal_flags.remove(element);
        self.snapshot.transitions.remove(element);
        self.snapshot.just_revealed.remove(element);

        if let Some(group) = self.groups.remove(element) {
            for child in &group.children {
                self.forget_child(child);
            }
        }

        let parent = self
            .groups
            .values()
            .find(|g| g.children.iter().any(|c| c.as_str() == element))
            .map(|g| g.parent.clone());
        if let Some(parent) = parent {
            if let Some(group) = self.groups.get_mut(&parent) {
                group.children.retain(|c| c.as_str() != element);
            }
            self.forget_child(&ElementId::from(element));
            self.refresh_group(&parent);
        }
    }

    /// Provide an element's layout directly
    ///
    /// An observed element is checked against the current viewport at once.
    pub fn set_element_rect(&mut self, element: impl Into<ElementId>, rect: ElementRect) {
        let element = element.into();
        self.rects.insert(element.clone(), rect);
        let viewport = self.bus.viewport();
        self.reveal_now(&element, viewport);
    }

    /// Evaluate an observed element with a known rect against `viewport`
    fn reveal_now(&mut self, element: &ElementId, viewport: Viewport) {
        let Some(rect) = self.rects.get(element).copied() else {
            return;
        };
        let Some(slot) = self.reveals.get_mut(element) else {
            return;
        };
        let ratio = intersection_ratio(rect, viewport, slot.controller.options().margin_px);
        let edge = slot.controller.on_intersection_change(ratio);
        let visible = slot.controller.entry().visible();

        self.apply_edge(element, edge);
        if edge == RevealEdge::Rising {
            self.early_reveals.insert(element.clone());
        }
        self.snapshot.reveal_flags.insert(element.clone(), visible);
        self.refresh_group(element);
    }

    /// Counter of delivered host notifications, readable after teardown
    pub fn probe(&self) -> EventProbe {
        EventProbe {
            inbox: self.inbox.clone(),
        }
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> &FrameSnapshot {
        &self.snapshot
    }

    pub fn tracker(&self) -> &ScrollTracker {
        &self.tracker
    }

    pub fn spring_params(&self) -> &SpringParams {
        &self.spring_params
    }

    /// True while any spring is moving, any entrance transition runs or any
    /// loop is mounted
    pub fn is_animating(&self) -> bool {
        !self.smoother.is_at_rest()
            || self
                .channels
                .iter()
                .filter_map(|slot| slot.spring.as_ref())
                .any(|spring| !spring.is_at_rest())
            || self.tracks.values().any(|track| track.is_running())
            || !self.loops.is_empty()
    }

    /// Run one animation frame of `dt` seconds and publish its snapshot
    pub fn tick(&mut self, dt: f64) -> &FrameSnapshot {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.clock += dt;

        // One scroll sample for the whole frame
        let sample = self.tracker.state();
        let viewport = Viewport {
            offset: sample.raw_offset,
            ..self.bus.viewport()
        };

        let smoothed = self.smoother.update(dt, sample.progress);
        for slot in &mut self.channels {
            if let Some(spring) = slot.spring.as_mut() {
                spring.update(dt, sample.progress);
            }
        }

        let pending = std::mem::take(&mut self.inbox.borrow_mut().pending);
        self.apply_pending(pending);

        let mut just_revealed = self.poll_reveals(viewport);
        just_revealed.append(&mut self.early_reveals);
        let frame = self.snapshot.frame + 1;
        self.snapshot = self.compose(sample, smoothed, just_revealed, frame);

        tracing::trace!(
            "Frame {}: progress {:.4} smoothed {:.4}",
            frame,
            sample.progress,
            smoothed
        );
        &self.snapshot
    }

    fn apply_pending(&mut self, pending: Pending) {
        for (element, rect, viewport) in pending.layouts {
            if !self.reveals.contains_key(&element) && !self.is_group_child(&element) {
                continue;
            }
            self.rects.insert(element.clone(), rect);
            self.reveal_now(&element, viewport);
        }
        for (element, ratio) in pending.intersections {
            if self.rects.contains_key(&element) {
                continue;
            }
            if let Some(slot) = self.reveals.get_mut(&element) {
                slot.pending.push(ratio);
            }
        }
        for element in pending.removed {
            tracing::debug!("Discarding removed element '{}'", element);
            self.drop_element(element.as_str());
        }
    }

    /// Feed intersection ratios through every controller and start transitions
    fn poll_reveals(&mut self, viewport: Viewport) -> BTreeSet<ElementId> {
        let mut just_revealed = BTreeSet::new();
        let mut edges: Vec<(ElementId, RevealEdge)> = Vec::new();

        for (element, slot) in self.reveals.iter_mut() {
            let ratios = match self.rects.get(element) {
                Some(rect) => {
                    slot.pending.clear();
                    vec![intersection_ratio(
                        *rect,
                        viewport,
                        slot.controller.options().margin_px,
                    )]
                }
                None => std::mem::take(&mut slot.pending),
            };

            for ratio in ratios {
                let edge = slot.controller.on_intersection_change(ratio);
                if edge != RevealEdge::None {
                    edges.push((element.clone(), edge));
                }
            }
        }

        for (element, edge) in edges {
            self.apply_edge(&element, edge);
            if edge == RevealEdge::Rising {
                just_revealed.insert(element);
            }
        }

        just_revealed
    }

    /// Start or reverse the entrance of `element` and its stagger children
    fn apply_edge(&mut self, element: &ElementId, edge: RevealEdge) {
        if edge == RevealEdge::None {
            return;
        }
        let Some(slot) = self.reveals.get(element) else {
            return;
        };
        let transition = slot.controller.options().transition;
        let children: Vec<(ElementId, f64)> = self
            .groups
            .get(element)
            .map(|group| {
                let plan = group.plan();
                group
                    .children
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.clone(), plan.delay(i).unwrap_or(0.0)))
                    .collect()
            })
            .unwrap_or_default();

        if edge == RevealEdge::Rising {
            tracing::debug!("'{}' revealed", element);
            if let Some(track) = self.tracks.get_mut(element) {
                track.show(self.clock, &transition, transition.delay);
            }
            for (child, delay) in &children {
                if let Some(track) = self.tracks.get_mut(child) {
                    track.show(self.clock, &transition, *delay);
                }
            }
        } else {
            tracing::debug!("'{}' left the viewport", element);
            if let Some(track) = self.tracks.get_mut(element) {
                track.hide(self.clock, &transition);
            }
            for (child, _) in &children {
                if let Some(track) = self.tracks.get_mut(child) {
                    track.hide(self.clock, &transition);
                }
            }
        }
    }

    fn compose(
        &mut self,
        sample: ScrollState,
        smoothed: f64,
        just_revealed: BTreeSet<ElementId>,
        frame: u64,
    ) -> FrameSnapshot {
        let derived_values = self
            .channels
            .iter()
            .map(|slot| {
                let input = match (&slot.channel.source, &slot.spring) {
                    (ChannelSource::Raw, _) => sample.progress,
                    (ChannelSource::Spring(_), Some(spring)) => spring.value(),
                    _ => smoothed,
                };
                (slot.channel.id.clone(), slot.channel.mapping.evaluate(input))
            })
            .collect();

        let mut reveal_flags: BTreeMap<ElementId, bool> = self
            .reveals
            .iter()
            .map(|(id, slot)| (id.clone(), slot.controller.entry().visible()))
            .collect();

        let mut stagger_delays = BTreeMap::new();
        for group in self.groups.values() {
            let parent_visible = reveal_flags.get(&group.parent).copied().unwrap_or(false);
            let plan = group.plan();
            for (index, child) in group.children.iter().enumerate() {
                reveal_flags.insert(child.clone(), parent_visible);
                if let Some(delay) = plan.delay(index) {
                    stagger_delays.insert(child.clone(), delay);
                }
            }
        }

        let clock = self.clock;
        let transitions = self
            .tracks
            .iter_mut()
            .map(|(id, track)| (id.clone(), track.sample(clock)))
            .collect();
        let loop_values = self
            .loops
            .iter()
            .map(|track| (track.animation().id.clone(), track.sample(clock)))
            .collect();

        FrameSnapshot {
            frame,
            time: clock,
            scroll: sample,
            progress: sample.progress,
            smoothed,
            derived_values,
            reveal_flags,
            just_revealed,
            stagger_delays,
            transitions,
            loop_values,
        }
    }

    /// Tear down: release every listener and stop producing frames
    pub fn unmount(self) {}
}

impl Drop for CompositionRoot {
    fn drop(&mut self) {
        tracing::debug!(
            "Composition unmounted ({} channels, {} reveals)",
            self.channels.len(),
            self.reveals.len()
        );
    }
}

fn enqueue(inbox: &mut Inbox, event: &HostEvent) {
    inbox.received += 1;
    apply_geometry(&mut inbox.viewport, event);
    let pending = &mut inbox.pending;
    match event {
        HostEvent::Layout { element, rect } => {
            pending.layouts.push((element.clone(), *rect, inbox.viewport))
        }
        HostEvent::Intersection { element, ratio } => {
            pending.intersections.push((element.clone(), *ratio))
        }
        HostEvent::Removed { element } => pending.removed.push(element.clone()),
        // Sampled through the tracker at tick time
        HostEvent::Scroll { .. } | HostEvent::Resize { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::transition::Transition;
    use crate::config::EasingType;

    const DT: f64 = 1.0 / 60.0;

    fn range_root(bus: &HostBus) -> CompositionRoot {
        CompositionRoot::new(
            bus,
            ObservationWindow::Range {
                start: 0.0,
                end: 1000.0,
            },
            &AppConfig::default(),
        )
        .unwrap()
    }

    fn mapping(points: &[(f64, f64)]) -> Mapping {
        Mapping::new(points.to_vec()).unwrap()
    }

    fn once() -> RevealOptions {
        RevealOptions {
            restartable: false,
            ..RevealOptions::default()
        }
    }

    fn intersect(bus: &HostBus, element: &str, ratio: f64) {
        bus.dispatch(HostEvent::Intersection {
            element: element.into(),
            ratio,
        });
    }

    #[test]
    fn test_scroll_spring_mapping_end_to_end() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.add_channel(
            Channel::new("hero.y", mapping(&[(0.0, 0.0), (0.5, -100.0), (1.0, -100.0)]))
                .with_unit(Unit::Px),
        )
        .unwrap();

        bus.dispatch(HostEvent::Scroll { offset: 250.0 });
        assert_eq!(root.tracker().progress(), 0.25);

        for _ in 0..600 {
            root.tick(DT);
        }
        let snapshot = root.snapshot();
        assert_eq!(snapshot.progress, 0.25);
        assert!((snapshot.smoothed - 0.25).abs() < 1e-6);
        assert!((snapshot.value("hero.y").unwrap() - -50.0).abs() < 1e-3);
    }

    #[test]
    fn test_snapshot_values_share_one_sample() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.add_channel(Channel::new("y", mapping(&[(0.0, 0.0), (1.0, -100.0)])).raw())
            .unwrap();
        root.add_channel(Channel::new("opacity", mapping(&[(0.0, 1.0), (1.0, 0.0)])).raw())
            .unwrap();

        for offset in [100.0, 420.0, 777.0] {
            bus.dispatch(HostEvent::Scroll { offset });
            let snapshot = root.tick(DT).clone();
            let p = snapshot.progress;
            assert!((snapshot.value("y").unwrap() - -100.0 * p).abs() < 1e-9);
            assert!((snapshot.value("opacity").unwrap() - (1.0 - p)).abs() < 1e-9);

            // Published frame doesn't move until the next tick
            bus.dispatch(HostEvent::Scroll { offset: 999.0 });
            assert_eq!(root.snapshot(), &snapshot);
        }
    }

    #[test]
    fn test_channel_with_own_spring() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        let m = mapping(&[(0.0, 0.0), (1.0, 1.0)]);
        root.add_channel(Channel::new("soft", m.clone())).unwrap();
        root.add_channel(Channel::new("snappy", m).with_spring(SpringParams::new(300.0, 40.0)))
            .unwrap();

        bus.dispatch(HostEvent::Scroll { offset: 1000.0 });
        let snapshot = root.tick(DT).clone();
        assert!(snapshot.value("snappy").unwrap() > snapshot.value("soft").unwrap());
    }

    #[test]
    fn test_reveal_rising_edge_once() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("hero", once()).unwrap();

        intersect(&bus, "hero", 0.5);
        let snapshot = root.tick(DT).clone();
        assert!(snapshot.is_revealed("hero"));
        assert!(snapshot.just_revealed.contains("hero"));

        let snapshot = root.tick(DT).clone();
        assert!(snapshot.is_revealed("hero"));
        assert!(snapshot.just_revealed.is_empty());

        intersect(&bus, "hero", 0.0);
        intersect(&bus, "hero", 0.7);
        let snapshot = root.tick(DT).clone();
        assert!(snapshot.is_revealed("hero"));
        assert!(snapshot.just_revealed.is_empty());
    }

    #[test]
    fn test_geometry_reveal_uses_frame_sample() {
        let bus = HostBus::with_viewport(Viewport {
            offset: 0.0,
            height: 800.0,
            content_height: 4000.0,
        });
        let mut root = CompositionRoot::new(&bus, ObservationWindow::Document, &AppConfig::default())
            .unwrap();
        root.observe_reveal("pricing", once()).unwrap();
        bus.dispatch(HostEvent::Layout {
            element: "pricing".into(),
            rect: ElementRect::new(1200.0, 200.0),
        });

        assert!(!root.tick(DT).is_revealed("pricing"));

        // Explicit events are ignored once a rect is known
        intersect(&bus, "pricing", 1.0);
        assert!(!root.tick(DT).is_revealed("pricing"));

        bus.dispatch(HostEvent::Scroll { offset: 500.0 });
        let snapshot = root.tick(DT).clone();
        assert!(snapshot.is_revealed("pricing"));
        assert!(snapshot.just_revealed.contains("pricing"));
    }

    #[test]
    fn test_margin_delays_reveal() {
        let bus = HostBus::with_viewport(Viewport {
            offset: 0.0,
            height: 800.0,
            content_height: 4000.0,
        });
        let mut root = CompositionRoot::new(&bus, ObservationWindow::Document, &AppConfig::default())
            .unwrap();
        let options = RevealOptions {
            margin_px: -100.0,
            ..once()
        };
        root.observe_reveal("cta", options).unwrap();
        root.set_element_rect("cta", ElementRect::new(850.0, 100.0));

        bus.dispatch(HostEvent::Scroll { offset: 100.0 });
        assert!(!root.tick(DT).is_revealed("cta"));
        bus.dispatch(HostEvent::Scroll { offset: 200.0 });
        assert!(root.tick(DT).is_revealed("cta"));
    }

    #[test]
    fn test_stagger_group_delays_children() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        let options = RevealOptions {
            transition: Transition {
                delay: 0.0,
                duration: 0.5,
                easing: EasingType::Linear,
            },
            ..once()
        };
        root.observe_reveal("features", options).unwrap();
        root.add_stagger_group(StaggerGroup {
            parent: "features".into(),
            children: vec!["a".into(), "b".into(), "c".into()],
            base_delay: 0.2,
            increment: 0.1,
        })
        .unwrap();

        let delays = &root.snapshot().stagger_delays;
        assert_eq!(delays.get("a"), Some(&0.2));
        assert_eq!(delays.get("b"), Some(&0.3));
        assert_eq!(delays.get("c"), Some(&0.4));
        assert!(!root.snapshot().is_revealed("b"));

        intersect(&bus, "features", 1.0);
        let snapshot = root.tick(0.1).clone();
        assert!(snapshot.is_revealed("b"));
        assert_eq!(snapshot.transition("a"), 0.0);

        for _ in 0..4 {
            root.tick(0.1);
        }
        let snapshot = root.snapshot();
        assert!(snapshot.transition("a") > snapshot.transition("b"));
        assert!(snapshot.transition("b") > snapshot.transition("c"));

        for _ in 0..20 {
            root.tick(0.1);
        }
        for child in ["features", "a", "b", "c"] {
            assert_eq!(root.snapshot().transition(child), 1.0, "{}", child);
        }
    }

    #[test]
    fn test_group_children_recompute() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("list", once()).unwrap();
        root.add_stagger_group(StaggerGroup {
            parent: "list".into(),
            children: vec!["x".into(), "y".into()],
            base_delay: 0.0,
            increment: 0.15,
        })
        .unwrap();

        root.set_group_children("list", vec!["y".into(), "z".into(), "w".into()])
            .unwrap();
        let snapshot = root.tick(DT);
        assert_eq!(snapshot.stagger_delays.get("x"), None);
        assert_eq!(snapshot.stagger_delays.get("y"), Some(&0.0));
        assert_eq!(snapshot.stagger_delays.get("w"), Some(&0.3));
    }

    fn linear_once(duration: f64) -> RevealOptions {
        RevealOptions {
            transition: Transition {
                delay: 0.0,
                duration,
                easing: EasingType::Linear,
            },
            ..once()
        }
    }

    #[test]
    fn test_children_joining_a_revealed_group_enter() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("grid", linear_once(0.5)).unwrap();
        root.add_stagger_group(StaggerGroup {
            parent: "grid".into(),
            children: vec!["a".into()],
            base_delay: 0.0,
            increment: 0.1,
        })
        .unwrap();

        intersect(&bus, "grid", 1.0);
        for _ in 0..20 {
            root.tick(0.1);
        }
        assert_eq!(root.snapshot().transition("a"), 1.0);

        root.set_group_children("grid", vec!["a".into(), "b".into()])
            .unwrap();
        let snapshot = root.tick(0.1).clone();
        assert_eq!(snapshot.transition("a"), 1.0);
        assert!(snapshot.transition("b") < 0.01);
        assert!(snapshot.is_revealed("b"));

        for _ in 0..50 {
            root.tick(0.1);
        }
        let snapshot = root.snapshot();
        assert_eq!(snapshot.transition("a"), 1.0);
        assert_eq!(snapshot.transition("b"), 1.0);
        assert_eq!(snapshot.stagger_delays.get("b"), Some(&0.1));
    }

    #[test]
    fn test_group_added_after_parent_revealed() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("grid", linear_once(0.5)).unwrap();
        intersect(&bus, "grid", 1.0);
        for _ in 0..10 {
            root.tick(0.1);
        }
        assert_eq!(root.snapshot().transition("grid"), 1.0);

        root.add_stagger_group(StaggerGroup {
            parent: "grid".into(),
            children: vec!["a".into(), "b".into()],
            base_delay: 0.2,
            increment: 0.1,
        })
        .unwrap();
        assert!(root.snapshot().is_revealed("a"));
        assert_eq!(root.snapshot().transition("a"), 0.0);

        for _ in 0..5 {
            root.tick(0.1);
        }
        let snapshot = root.snapshot();
        assert!(snapshot.transition("a") > snapshot.transition("b"));
        assert!(snapshot.transition("b") > 0.0);

        for _ in 0..20 {
            root.tick(0.1);
        }
        assert_eq!(root.snapshot().transition("a"), 1.0);
        assert_eq!(root.snapshot().transition("b"), 1.0);
    }

    #[test]
    fn test_element_in_view_at_mount_reveals() {
        let bus = HostBus::with_viewport(Viewport {
            offset: 0.0,
            height: 800.0,
            content_height: 4000.0,
        });
        let mut root = CompositionRoot::new(&bus, ObservationWindow::Document, &AppConfig::default())
            .unwrap();
        root.set_element_rect("hero", ElementRect::new(0.0, 600.0));
        root.observe_reveal("hero", once()).unwrap();
        assert!(root.snapshot().is_revealed("hero"));

        // Scrolled away before the first frame
        bus.dispatch(HostEvent::Scroll { offset: 3000.0 });
        let snapshot = root.tick(DT).clone();
        assert!(snapshot.is_revealed("hero"));
        assert!(snapshot.just_revealed.contains("hero"));

        let snapshot = root.tick(DT);
        assert!(snapshot.is_revealed("hero"));
        assert!(snapshot.just_revealed.is_empty());
    }

    #[test]
    fn test_layout_uses_viewport_it_was_reported_in() {
        let bus = HostBus::with_viewport(Viewport {
            offset: 0.0,
            height: 800.0,
            content_height: 4000.0,
        });
        let mut root = CompositionRoot::new(&bus, ObservationWindow::Document, &AppConfig::default())
            .unwrap();
        root.observe_reveal("card", once()).unwrap();

        bus.dispatch(HostEvent::Layout {
            element: "card".into(),
            rect: ElementRect::new(100.0, 200.0),
        });
        bus.dispatch(HostEvent::Scroll { offset: 3000.0 });

        let snapshot = root.tick(DT);
        assert!(snapshot.is_revealed("card"));
        assert!(snapshot.just_revealed.contains("card"));
    }

    #[test]
    fn test_layout_of_unobserved_elements_is_not_kept() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("card", once()).unwrap();

        for element in ["card", "stranger"] {
            bus.dispatch(HostEvent::Layout {
                element: element.into(),
                rect: ElementRect::new(5000.0, 100.0),
            });
        }
        root.tick(DT);

        assert!(root.rects.contains_key("card"));
        assert!(!root.rects.contains_key("stranger"));
    }

    #[test]
    fn test_loops_run_on_frame_clock() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        let pulse = KeyframeLoop::new("badge.pulse", vec![1.0, 1.1, 1.0], 2.0)
            .with_unit(Unit::Scale)
            .with_easing(EasingType::Linear);
        root.add_loop(pulse.clone()).unwrap();
        assert_eq!(root.snapshot().loop_value("badge.pulse"), Some(1.0));
        assert!(root.is_animating());

        bus.dispatch(HostEvent::Scroll { offset: 700.0 });
        root.tick(0.5);
        let snapshot = root.tick(0.5);
        assert!((snapshot.loop_value("badge.pulse").unwrap() - 1.1).abs() < 1e-9);

        // A late loop starts at its own first keyframe
        root.add_loop(KeyframeLoop::new("blob.y", vec![0.0, -20.0], 4.0)).unwrap();
        assert_eq!(root.snapshot().loop_value("blob.y"), Some(0.0));

        assert!(matches!(root.add_loop(pulse), Err(Error::DuplicateId(_))));
        assert!(root
            .add_loop(KeyframeLoop::new("bad", vec![1.0], 1.0))
            .is_err());
        assert_eq!(root.loops().count(), 2);

        assert!(root.remove_loop("badge.pulse"));
        assert_eq!(root.tick(DT).loop_value("badge.pulse"), None);
    }

    #[test]
    fn test_restartable_reverses_transition() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        let options = RevealOptions {
            restartable: true,
            transition: Transition {
                delay: 0.0,
                duration: 0.2,
                easing: EasingType::Linear,
            },
            ..RevealOptions::default()
        };
        root.observe_reveal("quote", options).unwrap();

        intersect(&bus, "quote", 0.5);
        for _ in 0..5 {
            root.tick(0.1);
        }
        assert_eq!(root.snapshot().transition("quote"), 1.0);

        intersect(&bus, "quote", 0.0);
        root.tick(0.1);
        assert!(!root.snapshot().is_revealed("quote"));
        for _ in 0..5 {
            root.tick(0.1);
        }
        assert_eq!(root.snapshot().transition("quote"), 0.0);

        intersect(&bus, "quote", 0.5);
        assert!(root.tick(0.1).just_revealed.contains("quote"));
    }

    #[test]
    fn test_invalid_registrations_are_refused() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        let m = mapping(&[(0.0, 0.0), (1.0, 1.0)]);

        root.add_channel(Channel::new("y", m.clone())).unwrap();
        assert!(matches!(
            root.add_channel(Channel::new("y", m.clone())),
            Err(Error::DuplicateId(_))
        ));
        assert!(matches!(
            root.add_channel(Channel::new("z", m).with_spring(SpringParams::new(-1.0, 10.0))),
            Err(Error::InvalidSpring(_))
        ));
        assert!(root.channel("z").is_none());

        let bad = RevealOptions {
            threshold: 2.0,
            ..once()
        };
        assert!(root.observe_reveal("card", bad).is_err());
        assert!(root.reveal_entry("card").is_none());

        assert!(matches!(
            root.add_stagger_group(StaggerGroup {
                parent: "ghost".into(),
                children: vec![],
                base_delay: 0.0,
                increment: 0.1,
            }),
            Err(Error::UnknownElement(_))
        ));

        root.observe_reveal("grid", once()).unwrap();
        root.observe_reveal("card", once()).unwrap();
        assert!(matches!(
            root.add_stagger_group(StaggerGroup {
                parent: "grid".into(),
                children: vec!["card".into()],
                base_delay: 0.0,
                increment: 0.1,
            }),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_removed_element_is_discarded_on_next_tick() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("card", once()).unwrap();

        bus.dispatch(HostEvent::Removed {
            element: "card".into(),
        });
        assert!(root.reveal_entry("card").is_some());

        intersect(&bus, "card", 1.0);
        let snapshot = root.tick(DT);
        assert!(!snapshot.reveal_flags.contains_key("card"));
        assert!(root.reveal_entry("card").is_none());

        // Unknown elements are ignored too
        intersect(&bus, "card", 1.0);
        bus.dispatch(HostEvent::Removed {
            element: "never-seen".into(),
        });
        root.tick(DT);
    }

    #[test]
    fn test_removed_child_leaves_group() {
        let bus = HostBus::new();
        let mut root = range_root(&bus);
        root.observe_reveal("grid", once()).unwrap();
        root.add_stagger_group(StaggerGroup {
            parent: "grid".into(),
            children: vec!["a".into(), "b".into(), "c".into()],
            base_delay: 0.0,
            increment: 0.1,
        })
        .unwrap();

        bus.dispatch(HostEvent::Removed {
            element: "a".into(),
        });
        let snapshot = root.tick(DT);
        assert_eq!(snapshot.stagger_delays.get("a"), None);
        assert_eq!(snapshot.stagger_delays.get("b"), Some(&0.0));
        assert_eq!(snapshot.stagger_delays.get("c"), Some(&0.1));
    }

    #[test]
    fn test_no_callbacks_after_teardown() {
        let bus = HostBus::new();
        let root = range_root(&bus);
        let probe = root.probe();

        bus.dispatch(HostEvent::Scroll { offset: 10.0 });
        intersect(&bus, "hero", 0.4);
        assert_eq!(probe.received(), 2);
        assert!(bus.listener_count() > 0);

        root.unmount();
        assert_eq!(bus.listener_count(), 0);

        bus.dispatch(HostEvent::Scroll { offset: 20.0 });
        bus.dispatch(HostEvent::Resize {
            viewport_height: 500.0,
            content_height: 900.0,
        });
        intersect(&bus, "hero", 0.9);
        bus.dispatch(HostEvent::Removed {
            element: "hero".into(),
        });
        assert_eq!(probe.received(), 2);
    }
}
