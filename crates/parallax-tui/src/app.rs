use std::sync::Arc;

use parallax_core::motion::{
    CompositionRoot, FrameClock, FrameSnapshot, HostBus, HostEvent, Unit,
};
use parallax_core::scene::SceneElement;
use parallax_core::{AppConfig, Result, Scene};

use crate::scroll::ScrollAnimator;
use crate::theme::Theme;

/// How an element's reveal currently looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    /// Not observed and not part of a stagger group
    Static,
    Waiting,
    Revealed,
}

/// Visual parameters of one element for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementPose {
    /// Vertical offset from channels, in pixels
    pub shift_px: f64,
    pub rotate_deg: f64,
    pub scale: f64,
    pub opacity: f64,
    /// Entrance transition progress, 1 for static elements
    pub entrance: f64,
    pub reveal: RevealState,
}

impl Default for ElementPose {
    fn default() -> Self {
        Self {
            shift_px: 0.0,
            rotate_deg: 0.0,
            scale: 1.0,
            opacity: 1.0,
            entrance: 1.0,
            reveal: RevealState::Static,
        }
    }
}

/// Preview state
pub struct App {
    pub config: Arc<AppConfig>,
    pub scene: Scene,
    bus: HostBus,
    root: CompositionRoot,
    animator: ScrollAnimator,
    clock: FrameClock,
    pub theme: Theme,
    /// Terminal rows available to the page
    pub viewport_rows: u16,
    pub show_inspector: bool,
    pub paused: bool,
    pub should_quit: bool,
    pub status_message: Option<String>,
    /// Pending key for multi-key sequences (e.g., 'gg')
    pub pending_key: Option<char>,
}

impl App {
    pub fn new(config: Arc<AppConfig>, scene: Scene) -> Result<Self> {
        let bus = scene.host();
        let root = scene.build(&bus, &config)?;
        let animator = ScrollAnimator::new(config.preview.clone());
        let clock = FrameClock::new(config.frame.step_secs());

        Ok(Self {
            config,
            scene,
            bus,
            root,
            animator,
            clock,
            theme: Theme::default(),
            viewport_rows: 0,
            show_inspector: true,
            paused: false,
            should_quit: false,
            status_message: None,
            pending_key: None,
        })
    }

    pub fn snapshot(&self) -> &FrameSnapshot {
        self.root.snapshot()
    }

    pub fn root(&self) -> &CompositionRoot {
        &self.root
    }

    /// Current scroll offset in page pixels
    pub fn offset(&self) -> f64 {
        self.bus.viewport().offset
    }

    pub fn max_offset(&self) -> f64 {
        self.scene.viewport().max_offset()
    }

    /// Page pixels represented by one terminal row
    pub fn px_per_row(&self) -> f64 {
        self.scene.viewport_height / self.viewport_rows.max(1) as f64
    }

    pub fn set_viewport_rows(&mut self, rows: u16) {
        self.viewport_rows = rows;
    }

    pub fn scroll_down(&mut self) {
        self.animator.scroll_by(self.config.preview.scroll_step_px);
    }

    pub fn scroll_up(&mut self) {
        self.animator.scroll_by(-self.config.preview.scroll_step_px);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.animator.scroll_by(self.scene.viewport_height / 2.0);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.animator.scroll_by(-self.scene.viewport_height / 2.0);
    }

    pub fn scroll_page_down(&mut self) {
        self.animator.scroll_by(self.scene.viewport_height);
    }

    pub fn scroll_page_up(&mut self) {
        self.animator.scroll_by(-self.scene.viewport_height);
    }

    pub fn jump_to_top(&mut self) {
        self.animator.scroll_to(0.0, self.max_offset());
    }

    pub fn jump_to_bottom(&mut self) {
        let max = self.max_offset();
        self.animator.scroll_to(max, max);
    }

    /// Advance by `elapsed` wall-clock seconds; returns the engine frames run
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        if self.paused {
            return 0;
        }

        let max = self.max_offset();
        let offset = self.animator.update(elapsed, max);
        if offset != self.offset() {
            self.bus.dispatch(HostEvent::Scroll { offset });
        }

        let frames = self.clock.advance(elapsed);
        let step = self.clock.step();
        for _ in 0..frames {
            self.root.tick(step);
        }
        frames
    }

    /// Run exactly one engine frame, even while paused
    pub fn step_frame(&mut self) {
        let (step, max) = (self.clock.step(), self.max_offset());
        let offset = self.animator.update(step, max);
        if offset != self.offset() {
            self.bus.dispatch(HostEvent::Scroll { offset });
        }
        self.root.tick(step);
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.clock.reset();
        self.set_status(if self.paused { "Paused" } else { "Resumed" });
    }

    pub fn toggle_inspector(&mut self) {
        self.show_inspector = !self.show_inspector;
    }

    /// Remount the scene at the top of the page so every reveal plays again
    pub fn replay(&mut self) -> Result<()> {
        self.animator.reset();
        self.bus.dispatch(HostEvent::Scroll { offset: 0.0 });
        self.root = self.scene.build(&self.bus, &self.config)?;
        self.clock.reset();
        tracing::info!("Replaying scene '{}'", self.scene.name);
        self.set_status("Replaying");
        Ok(())
    }

    /// True while the next frames would differ from the current one
    pub fn is_animating(&self) -> bool {
        !self.paused && (self.animator.needs_update() || self.root.is_animating())
    }

    /// Combine every channel and loop bound to `element` with its reveal state
    pub fn element_pose(&self, element: &SceneElement) -> ElementPose {
        let snapshot = self.snapshot();
        let mut pose = ElementPose::default();

        let channels = self
            .scene
            .channels_for(element.id.as_str())
            .filter_map(|c| snapshot.value(&c.id).map(|v| (c.unit, v)));
        let loops = self
            .scene
            .loops_for(element.id.as_str())
            .filter_map(|l| snapshot.loop_value(&l.id).map(|v| (l.unit, v)));

        for (unit, value) in channels.chain(loops) {
            match unit {
                Unit::Px => pose.shift_px += value,
                Unit::Percent => pose.shift_px += value / 100.0 * element.height,
                Unit::Deg => pose.rotate_deg += value,
                Unit::Scale => pose.scale *= value,
                Unit::Opacity => pose.opacity *= value,
                Unit::None => {}
            }
        }

        if let Some(flag) = snapshot.reveal_flags.get(element.id.as_str()) {
            pose.reveal = if *flag {
                RevealState::Revealed
            } else {
                RevealState::Waiting
            };
            pose.entrance = snapshot.transition(element.id.as_str());
        }
        pose
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn clear_pending_key(&mut self) {
        self.pending_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::config::PreviewConfig;

    fn app() -> App {
        let config = AppConfig {
            preview: PreviewConfig {
                smooth_enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut app = App::new(Arc::new(config), Scene::landing()).unwrap();
        app.set_viewport_rows(40);
        app
    }

    #[test]
    fn test_scroll_feeds_engine() {
        let mut app = app();
        app.scroll_page_down();
        let frames = app.advance(0.1);

        assert_eq!(app.offset(), 800.0);
        assert!(frames >= 1);
        assert_eq!(app.snapshot().progress, 800.0 / 3200.0);
        assert!(app.snapshot().is_revealed("features"));
    }

    #[test]
    fn test_px_per_row() {
        let app = app();
        assert_eq!(app.px_per_row(), 20.0);
    }

    #[test]
    fn test_element_pose_combines_channels() {
        let mut app = app();
        app.jump_to_bottom();
        for _ in 0..300 {
            app.advance(1.0 / 60.0);
        }

        let hero = app.scene.element("hero").cloned().unwrap();
        let pose = app.element_pose(&hero);
        assert!((pose.shift_px - -50.0).abs() < 1e-3);
        assert!(pose.opacity.abs() < 1e-3);
        assert_eq!(pose.reveal, RevealState::Revealed);

        let badge = app.scene.element("badge").cloned().unwrap();
        let pose = app.element_pose(&badge);
        assert_eq!(pose.rotate_deg, 360.0);
        assert_eq!(pose.reveal, RevealState::Static);
        assert_eq!(pose.entrance, 1.0);
    }

    #[test]
    fn test_element_pose_includes_loops() {
        let mut app = app();
        for _ in 0..60 {
            app.advance(1.0 / 60.0);
        }

        let badge = app.scene.element("badge").cloned().unwrap();
        let pose = app.element_pose(&badge);
        assert!((pose.scale - 1.1).abs() < 1e-6);
        assert!(app.is_animating());
    }

    #[test]
    fn test_pause_stops_frames() {
        let mut app = app();
        app.toggle_pause();
        assert_eq!(app.advance(1.0), 0);
        let frame = app.snapshot().frame;
        app.step_frame();
        assert_eq!(app.snapshot().frame, frame + 1);
    }

    #[test]
    fn test_replay_resets_reveals() {
        let mut app = app();
        app.jump_to_bottom();
        app.advance(0.1);
        assert!(app.snapshot().is_revealed("cta"));

        app.replay().unwrap();
        assert_eq!(app.offset(), 0.0);
        assert!(!app.snapshot().is_revealed("cta"));
    }
}
