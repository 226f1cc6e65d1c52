pub mod config;
pub mod run;
pub mod simulate;
pub mod stagger;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use parallax_core::Scene;

/// Load `path`, or the built-in landing page when no path is given
pub fn load_scene(path: Option<&Path>) -> Result<Scene> {
    match path {
        Some(path) => Scene::load(path)
            .with_context(|| format!("Failed to load scene {}", path.display())),
        None => Ok(Scene::landing()),
    }
}
