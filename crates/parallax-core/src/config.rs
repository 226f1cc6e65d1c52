use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub spring: SpringConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub stagger: StaggerConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (log file lives here)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Default spring used to smooth scroll progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpringConfig {
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Distance to target under which the spring may come to rest
    #[serde(default = "default_rest_delta")]
    pub rest_delta: f64,
    /// Speed under which the spring may come to rest
    #[serde(default = "default_rest_speed")]
    pub rest_speed: f64,
    /// Longest single integration step; longer ticks are subdivided
    #[serde(default = "default_max_step_secs")]
    pub max_step_secs: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: default_stiffness(),
            damping: default_damping(),
            mass: default_mass(),
            rest_delta: default_rest_delta(),
            rest_speed: default_rest_speed(),
            max_step_secs: default_max_step_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Fixed-step frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { fps: default_fps() }
    }
}

impl FrameConfig {
    /// Length of one frame in seconds
    pub fn step_secs(&self) -> f64 {
        if self.fps == 0 {
            1.0 / default_fps() as f64
        } else {
            1.0 / self.fps as f64
        }
    }
}

/// Defaults applied to reveal observations that don't override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Visible fraction that must be exceeded to reveal (0.0 = any pixel)
    #[serde(default)]
    pub threshold: f64,
    /// Grows (positive) or shrinks (negative) the viewport on top and bottom
    #[serde(default)]
    pub margin_px: f64,
    /// Latch after the first reveal
    #[serde(default = "default_true")]
    pub once: bool,
    #[serde(default = "default_reveal_duration")]
    pub duration_secs: f64,
    #[serde(default = "default_reveal_easing")]
    pub easing: EasingType,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            margin_px: 0.0,
            once: default_true(),
            duration_secs: default_reveal_duration(),
            easing: default_reveal_easing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaggerConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay: f64,
    #[serde(default = "default_increment")]
    pub increment: f64,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self {
            base_delay: default_base_delay(),
            increment: default_increment(),
        }
    }
}

/// Terminal preview settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Idle tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,
    /// Pixels scrolled per key press
    #[serde(default = "default_scroll_step")]
    pub scroll_step_px: f64,
    /// Enable eased keyboard scrolling
    #[serde(default = "default_true")]
    pub smooth_enabled: bool,
    #[serde(default = "default_animation_duration")]
    pub animation_duration_ms: u64,
    #[serde(default)]
    pub easing: EasingType,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate(),
            scroll_step_px: default_scroll_step(),
            smooth_enabled: default_true(),
            animation_duration_ms: default_animation_duration(),
            easing: EasingType::default(),
        }
    }
}

/// Easing curve for tweened transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingType {
    /// Jump to the end value when the tween completes
    None,
    Linear,
    #[default]
    Cubic,
    Quintic,
    /// Exponential ease-out
    EaseOut,
    /// Cubic ease-in-out
    EaseInOut,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parallax")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_stiffness() -> f64 {
    100.0
}

fn default_damping() -> f64 {
    30.0
}

fn default_mass() -> f64 {
    1.0
}

fn default_rest_delta() -> f64 {
    0.0001
}

fn default_rest_speed() -> f64 {
    0.001
}

fn default_max_step_secs() -> f64 {
    1.0 / 30.0
}

fn default_fps() -> u32 {
    60
}

fn default_reveal_duration() -> f64 {
    0.6
}

fn default_reveal_easing() -> EasingType {
    EasingType::EaseOut
}

fn default_base_delay() -> f64 {
    0.2 // delayChildren used across most page sections
}

fn default_increment() -> f64 {
    0.1
}

fn default_tick_rate() -> u64 {
    100
}

fn default_scroll_step() -> f64 {
    40.0
}

fn default_animation_duration() -> u64 {
    150
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, defaults when it doesn't exist
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/parallax/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("parallax")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Log file used while the terminal preview owns stdout
    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("parallax.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.spring.stiffness, 100.0);
        assert_eq!(config.spring.damping, 30.0);
        assert_eq!(config.frame.fps, 60);
        assert!(config.reveal.once);
        assert_eq!(config.reveal.easing, EasingType::EaseOut);
        assert_eq!(config.preview.easing, EasingType::Cubic);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [spring]
            stiffness = 300

            [reveal]
            once = false
            easing = "ease-in-out"
            "#,
        )
        .unwrap();

        assert_eq!(config.spring.stiffness, 300.0);
        assert_eq!(config.spring.damping, 30.0);
        assert!(!config.reveal.once);
        assert_eq!(config.reveal.easing, EasingType::EaseInOut);
        assert_eq!(config.stagger.increment, 0.1);
    }

    #[test]
    fn test_step_secs_zero_fps_fallback() {
        let frame = FrameConfig { fps: 0 };
        assert!((frame.step_secs() - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_missing_path_gives_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/parallax/config.toml")).unwrap();
        assert_eq!(config.general.log_level, "info");
    }
}
