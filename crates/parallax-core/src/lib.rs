pub mod config;
pub mod error;
pub mod motion;
pub mod scene;

pub use config::{AppConfig, EasingType};
pub use error::{Error, Result};
pub use scene::Scene;
