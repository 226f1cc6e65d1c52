mod inspector;
mod scene_view;
mod status_bar;

pub use inspector::InspectorWidget;
pub use scene_view::SceneViewWidget;
pub use status_bar::StatusBarWidget;
