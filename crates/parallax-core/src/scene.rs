//! Scene description files
//!
//! A scene lists the page geometry, the tracker window, derived channels,
//! observed elements, stagger groups and ambient keyframe loops. [`Scene::build`] registers all of it
//! on a fresh [`CompositionRoot`].
//!
//! ```toml
//! name = "landing"
//! viewport_height = 800
//! content_height = 4000
//!
//! [window]
//! kind = "document"
//!
//! [[elements]]
//! id = "hero"
//! top = 0
//! height = 800
//!
//! [[channels]]
//! id = "hero.y"
//! element = "hero"
//! unit = "px"
//! input = [0.0, 0.3]
//! output = [0.0, -50.0]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, EasingType};
use crate::motion::{
    Channel, CompositionRoot, ElementId, ElementRect, HostBus, HostEvent, KeyframeLoop, Mapping,
    ObservationWindow, RepeatType, RevealOptions, SpringParams, StaggerGroup, Unit, Viewport,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    pub viewport_height: f64,
    pub content_height: f64,
    #[serde(default = "default_window")]
    pub window: ObservationWindow,
    #[serde(default)]
    pub elements: Vec<SceneElement>,
    #[serde(default)]
    pub channels: Vec<SceneChannel>,
    #[serde(default)]
    pub groups: Vec<SceneGroup>,
    #[serde(default)]
    pub loops: Vec<SceneLoop>,
}

/// A laid-out block on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneElement {
    pub id: ElementId,
    #[serde(default)]
    pub label: Option<String>,
    pub top: f64,
    pub height: f64,
    /// Observe for reveals; omitted for static blocks and stagger children
    #[serde(default)]
    pub reveal: Option<SceneReveal>,
}

impl SceneElement {
    pub fn rect(&self) -> ElementRect {
        ElementRect::new(self.top, self.height)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Per-element overrides of the `[reveal]` config defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneReveal {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub once: Option<bool>,
    #[serde(default)]
    pub margin_px: Option<f64>,
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub easing: Option<EasingType>,
}

impl SceneReveal {
    pub fn options(&self, defaults: RevealOptions) -> RevealOptions {
        let mut options = defaults;
        if let Some(threshold) = self.threshold {
            options.threshold = threshold;
        }
        if let Some(once) = self.once {
            options.restartable = !once;
        }
        if let Some(margin) = self.margin_px {
            options.margin_px = margin;
        }
        if let Some(delay) = self.delay {
            options.transition.delay = delay;
        }
        if let Some(duration) = self.duration {
            options.transition.duration = duration;
        }
        if let Some(easing) = self.easing {
            options.transition.easing = easing;
        }
        options
    }
}

/// A scroll-derived value, optionally bound to the element it styles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneChannel {
    pub id: String,
    #[serde(default)]
    pub element: Option<ElementId>,
    #[serde(default)]
    pub unit: Unit,
    pub input: Vec<f64>,
    pub output: Vec<f64>,
    /// Read spring-smoothed progress (`false` reads raw progress)
    #[serde(default = "default_true")]
    pub smooth: bool,
    /// Dedicated spring instead of the shared one
    #[serde(default)]
    pub spring: Option<SceneSpring>,
}

impl SceneChannel {
    pub fn to_channel(&self) -> Result<Channel> {
        let mapping = Mapping::from_ranges(&self.input, &self.output)?;
        let channel = Channel::new(self.id.clone(), mapping).with_unit(self.unit);
        Ok(match (&self.spring, self.smooth) {
            (Some(spring), _) => channel.with_spring(spring.params()),
            (None, false) => channel.raw(),
            (None, true) => channel,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpring {
    pub stiffness: f64,
    pub damping: f64,
    #[serde(default)]
    pub mass: Option<f64>,
}

impl SceneSpring {
    pub fn params(&self) -> SpringParams {
        let params = SpringParams::new(self.stiffness, self.damping);
        match self.mass {
            Some(mass) => params.with_mass(mass),
            None => params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneGroup {
    pub parent: ElementId,
    pub children: Vec<ElementId>,
    /// Falls back to `[stagger] base_delay`
    #[serde(default)]
    pub base_delay: Option<f64>,
    /// Falls back to `[stagger] increment`
    #[serde(default)]
    pub increment: Option<f64>,
}

/// A repeating keyframe animation, optionally bound to the element it styles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLoop {
    pub id: String,
    #[serde(default)]
    pub element: Option<ElementId>,
    #[serde(default)]
    pub unit: Unit,
    pub keyframes: Vec<f64>,
    /// Seconds per cycle
    pub duration: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub repeat_delay: f64,
    #[serde(default)]
    pub repeat_type: RepeatType,
    #[serde(default = "default_loop_easing")]
    pub easing: EasingType,
}

impl SceneLoop {
    pub fn to_loop(&self) -> KeyframeLoop {
        KeyframeLoop::new(self.id.clone(), self.keyframes.clone(), self.duration)
            .with_unit(self.unit)
            .with_delay(self.delay)
            .with_repeat_delay(self.repeat_delay)
            .with_repeat_type(self.repeat_type)
            .with_easing(self.easing)
    }
}

fn default_loop_easing() -> EasingType {
    EasingType::EaseInOut
}

fn default_window() -> ObservationWindow {
    ObservationWindow::Document
}

fn default_true() -> bool {
    true
}

impl Scene {
    /// Load a scene from a `.json` or `.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let scene: Scene = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content).map_err(|e| Error::Scene(e.to_string()))?
        };
        tracing::info!(
            "Loaded scene '{}' from {} ({} elements, {} channels)",
            scene.name,
            path.display(),
            scene.elements.len(),
            scene.channels.len()
        );
        Ok(scene)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Scene(e.to_string()))
    }

    /// Viewport at the top of the page
    pub fn viewport(&self) -> Viewport {
        Viewport {
            offset: 0.0,
            height: self.viewport_height,
            content_height: self.content_height,
        }
    }

    /// A bus already sized for this scene
    pub fn host(&self) -> HostBus {
        HostBus::with_viewport(self.viewport())
    }

    pub fn element(&self, id: &str) -> Option<&SceneElement> {
        self.elements.iter().find(|e| e.id.as_str() == id)
    }

    /// Channels that style `element`
    pub fn channels_for<'a>(&'a self, element: &'a str) -> impl Iterator<Item = &'a SceneChannel> {
        self.channels
            .iter()
            .filter(move |c| c.element.as_ref().map(|e| e.as_str()) == Some(element))
    }

    /// Keyframe loops that style `element`
    pub fn loops_for<'a>(&'a self, element: &'a str) -> impl Iterator<Item = &'a SceneLoop> {
        self.loops
            .iter()
            .filter(move |l| l.element.as_ref().map(|e| e.as_str()) == Some(element))
    }

    fn check_geometry(&self) -> Result<()> {
        if !self.viewport_height.is_finite() || self.viewport_height <= 0.0 {
            return Err(Error::Scene(format!(
                "viewport_height must be positive, got {}",
                self.viewport_height
            )));
        }
        if !self.content_height.is_finite() || self.content_height < 0.0 {
            return Err(Error::Scene(format!(
                "content_height must not be negative, got {}",
                self.content_height
            )));
        }

        let mut seen = BTreeSet::new();
        for element in &self.elements {
            if !element.top.is_finite() || !element.height.is_finite() || element.height < 0.0 {
                return Err(Error::Scene(format!(
                    "element '{}' has invalid geometry",
                    element.id
                )));
            }
            if !seen.insert(&element.id) {
                return Err(Error::DuplicateId(element.id.to_string()));
            }
        }

        let bound = self
            .channels
            .iter()
            .filter_map(|c| c.element.as_ref())
            .chain(self.loops.iter().filter_map(|l| l.element.as_ref()));
        for element in bound {
            if !seen.contains(element) {
                return Err(Error::UnknownElement(element.to_string()));
            }
        }
        Ok(())
    }

    /// Register every channel, element and group on a new root mounted on `bus`
    ///
    /// The bus is resized to the scene's geometry first. Nothing stays
    /// mounted when an entry is refused.
    pub fn build(&self, bus: &HostBus, config: &AppConfig) -> Result<CompositionRoot> {
        self.check_geometry()?;

        bus.dispatch(HostEvent::Resize {
            viewport_height: self.viewport_height,
            content_height: self.content_height,
        });

        let mut root = CompositionRoot::new(bus, self.window.clone(), config)?;
        let defaults = root.reveal_defaults();

        if let ObservationWindow::Element { element, .. } = &self.window {
            match self.element(element.as_str()) {
                Some(target) => root.tracker().set_target_rect(target.rect()),
                None => return Err(Error::UnknownElement(element.to_string())),
            }
        }

        for element in &self.elements {
            root.set_element_rect(element.id.clone(), element.rect());
            if let Some(reveal) = &element.reveal {
                root.observe_reveal(element.id.clone(), reveal.options(defaults))?;
            }
        }

        for channel in &self.channels {
            root.add_channel(channel.to_channel()?)?;
        }

        for group in &self.groups {
            root.add_stagger_group(StaggerGroup {
                parent: group.parent.clone(),
                children: group.children.clone(),
                base_delay: group.base_delay.unwrap_or(config.stagger.base_delay),
                increment: group.increment.unwrap_or(config.stagger.increment),
            })?;
        }

        for animation in &self.loops {
            root.add_loop(animation.to_loop())?;
        }

        tracing::info!("Scene '{}' mounted", self.name);
        Ok(root)
    }

    /// Built-in landing page demo
    pub fn landing() -> Self {
        let once = |margin_px: f64| SceneReveal {
            once: Some(true),
            margin_px: Some(margin_px),
            ..SceneReveal::default()
        };
        let block = |id: &str, label: &str, top: f64, height: f64, reveal: Option<SceneReveal>| {
            SceneElement {
                id: id.into(),
                label: Some(label.to_string()),
                top,
                height,
                reveal,
            }
        };
        let channel = |id: &str, element: &str, unit: Unit, input: &[f64], output: &[f64]| {
            SceneChannel {
                id: id.to_string(),
                element: Some(element.into()),
                unit,
                input: input.to_vec(),
                output: output.to_vec(),
                smooth: true,
                spring: None,
            }
        };

        let mut elements = vec![
            block("hero", "Build faster with parallax", 0.0, 640.0, Some(once(0.0))),
            block("badge", "New", 80.0, 80.0, None),
            block("features", "Features", 900.0, 760.0, Some(once(-100.0))),
        ];
        for (i, label) in ["Springs", "Mappings", "Reveals", "Stagger"].into_iter().enumerate() {
            elements.push(block(
                &format!("feature-{}", i + 1),
                label,
                980.0 + i as f64 * 160.0,
                140.0,
                None,
            ));
        }
        elements.push(block(
            "testimonial",
            "What people say",
            1900.0,
            480.0,
            Some(SceneReveal {
                threshold: Some(0.3),
                once: Some(false),
                ..SceneReveal::default()
            }),
        ));
        elements.push(block("pricing", "Pricing", 2600.0, 700.0, Some(once(-100.0))));
        elements.push(block("cta", "Get started", 3500.0, 400.0, Some(once(0.0))));

        let mut badge = channel("badge.rotate", "badge", Unit::Deg, &[0.0, 1.0], &[0.0, 360.0]);
        badge.smooth = false;
        let ambient = |id: &str, element: &str, unit: Unit, keyframes: &[f64], duration: f64| {
            SceneLoop {
                id: id.to_string(),
                element: Some(element.into()),
                unit,
                keyframes: keyframes.to_vec(),
                duration,
                delay: 0.0,
                repeat_delay: 0.0,
                repeat_type: RepeatType::Loop,
                easing: EasingType::EaseInOut,
            }
        };
        let mut wiggle = ambient("cta.wiggle", "cta", Unit::Deg, &[0.0, 5.0, -5.0, 0.0], 2.0);
        wiggle.repeat_delay = 3.0;

        let mut pricing = channel("pricing.scale", "pricing", Unit::Scale, &[0.4, 0.7], &[0.9, 1.0]);
        pricing.spring = Some(SceneSpring {
            stiffness: 200.0,
            damping: 40.0,
            mass: None,
        });

        Scene {
            name: "landing".to_string(),
            viewport_height: 800.0,
            content_height: 4000.0,
            window: ObservationWindow::Document,
            elements,
            channels: vec![
                channel("hero.y", "hero", Unit::Px, &[0.0, 0.3], &[0.0, -50.0]),
                channel("hero.opacity", "hero", Unit::Opacity, &[0.0, 0.5], &[1.0, 0.0]),
                badge,
                channel("features.y", "features", Unit::Percent, &[0.0, 0.5], &[0.0, 50.0]),
                pricing,
            ],
            groups: vec![SceneGroup {
                parent: "features".into(),
                children: (1..=4).map(|i| format!("feature-{}", i).into()).collect(),
                base_delay: Some(0.2),
                increment: Some(0.1),
            }],
            loops: vec![
                ambient("badge.pulse", "badge", Unit::Scale, &[1.0, 1.1, 1.0], 2.0),
                wiggle,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_builds() {
        let scene = Scene::landing();
        let bus = HostBus::new();
        let mut root = scene.build(&bus, &AppConfig::default()).unwrap();

        assert_eq!(bus.viewport().height, 800.0);
        assert_eq!(root.channels().count(), 5);

        let snapshot = root.tick(1.0 / 60.0).clone();
        assert!(snapshot.is_revealed("hero"));
        assert!(!snapshot.is_revealed("features"));
        assert_eq!(snapshot.stagger_delays.get("feature-1"), Some(&0.2));
        assert_eq!(snapshot.stagger_delays.get("feature-4"), Some(&0.5));
        assert_eq!(snapshot.value("hero.opacity"), Some(1.0));
    }

    #[test]
    fn test_landing_scroll_reveals_features() {
        let scene = Scene::landing();
        let bus = HostBus::new();
        let mut root = scene.build(&bus, &AppConfig::default()).unwrap();

        bus.dispatch(HostEvent::Scroll { offset: 600.0 });
        let snapshot = root.tick(1.0 / 60.0);
        assert!(snapshot.just_revealed.contains("features"));
        assert!(snapshot.is_revealed("feature-3"));
    }

    #[test]
    fn test_parse_toml_scene() {
        let scene: Scene = toml::from_str(
            r#"
            name = "mini"
            viewport_height = 600
            content_height = 1600

            [window]
            kind = "range"
            start = 0
            end = 1000

            [[elements]]
            id = "card"
            top = 900
            height = 200
            reveal = { threshold = 0.5, once = false, easing = "linear" }

            [[channels]]
            id = "card.y"
            element = "card"
            unit = "px"
            input = [0.0, 0.5, 1.0]
            output = [0.0, -100.0, -100.0]
            smooth = false
            "#,
        )
        .unwrap();

        assert_eq!(
            scene.window,
            ObservationWindow::Range {
                start: 0.0,
                end: 1000.0
            }
        );
        let reveal = scene.elements[0].reveal.as_ref().unwrap();
        let options = reveal.options(RevealOptions::default());
        assert_eq!(options.threshold, 0.5);
        assert!(options.restartable);
        assert_eq!(options.transition.easing, EasingType::Linear);

        let bus = HostBus::new();
        let mut root = scene.build(&bus, &AppConfig::default()).unwrap();
        bus.dispatch(HostEvent::Scroll { offset: 250.0 });
        assert_eq!(root.tick(0.016).value("card.y"), Some(-50.0));
    }

    #[test]
    fn test_element_window_offsets_from_strings() {
        let scene: Scene = serde_json::from_str(
            r#"{
                "viewport_height": 800,
                "content_height": 3000,
                "window": { "kind": "element", "element": "hero", "offset": ["start start", "end start"] },
                "elements": [{ "id": "hero", "top": 0, "height": 1000 }]
            }"#,
        )
        .unwrap();

        let bus = HostBus::new();
        let root = scene.build(&bus, &AppConfig::default()).unwrap();
        bus.dispatch(HostEvent::Scroll { offset: 500.0 });
        assert_eq!(root.tracker().progress(), 0.5);
    }

    #[test]
    fn test_invalid_scenes_refused() {
        let bus = HostBus::new();
        let config = AppConfig::default();

        let mut scene = Scene::landing();
        scene.channels[0].input = vec![0.3, 0.0];
        assert!(matches!(
            scene.build(&bus, &config),
            Err(Error::InvalidMapping(_))
        ));

        let mut scene = Scene::landing();
        scene.elements.push(scene.elements[0].clone());
        assert!(matches!(scene.build(&bus, &config), Err(Error::DuplicateId(_))));

        let mut scene = Scene::landing();
        scene.channels[0].element = Some("missing".into());
        assert!(matches!(
            scene.build(&bus, &config),
            Err(Error::UnknownElement(_))
        ));

        let mut scene = Scene::landing();
        scene.viewport_height = 0.0;
        assert!(matches!(scene.build(&bus, &config), Err(Error::Scene(_))));

        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_landing_loops_keep_moving() {
        let scene = Scene::landing();
        let bus = HostBus::new();
        let mut root = scene.build(&bus, &AppConfig::default()).unwrap();
        assert_eq!(root.loops().count(), 2);
        assert_eq!(scene.loops_for("badge").count(), 1);

        for _ in 0..60 {
            root.tick(1.0 / 60.0);
        }
        let snapshot = root.snapshot();
        assert!((snapshot.loop_value("badge.pulse").unwrap() - 1.1).abs() < 1e-6);
        // Halfway through the wiggle, swinging back through zero
        assert!(snapshot.loop_value("cta.wiggle").unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_parse_loop_defaults() {
        let scene: Scene = toml::from_str(
            r#"
            viewport_height = 600
            content_height = 600

            [[elements]]
            id = "blob"
            top = 0
            height = 100

            [[loops]]
            id = "blob.y"
            element = "blob"
            unit = "px"
            keyframes = [0.0, -20.0]
            duration = 4
            repeat_type = "reverse"
            "#,
        )
        .unwrap();

        let animation = scene.loops[0].to_loop();
        assert_eq!(animation.easing, EasingType::EaseInOut);
        assert_eq!(animation.repeat_type, RepeatType::Reverse);
        assert_eq!(animation.delay, 0.0);

        let mut broken = scene.clone();
        broken.loops[0].element = Some("missing".into());
        let bus = HostBus::new();
        assert!(matches!(
            broken.build(&bus, &AppConfig::default()),
            Err(Error::UnknownElement(_))
        ));

        broken.loops[0].element = None;
        broken.loops[0].keyframes = vec![1.0];
        assert!(broken.build(&bus, &AppConfig::default()).is_err());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_demo_file_matches_builtin() {
        let scene: Scene = toml::from_str(include_str!("../../../demos/landing.toml")).unwrap();
        assert_eq!(scene, Scene::landing());
    }
}
