//! Eased keyboard scrolling for the preview
//!
//! Key presses move a target scroll offset; the animator eases the visible
//! offset towards it so the engine receives a stream of scroll events the way
//! a browser would during a smooth scroll.
//!
//! # Architecture
//!
//! The easing curves and timing helpers live in `parallax_core::motion`
//! (L4 Atomic Layer); this module only holds the L3 controller.
//!
//! # Usage
//!
//! ```ignore
//! use parallax_tui::scroll::ScrollAnimator;
//!
//! let mut animator = ScrollAnimator::new(config.preview.clone());
//! animator.scroll_by(40.0);
//!
//! // Each frame, advance by the elapsed seconds
//! let offset = animator.update(elapsed, max_offset);
//! ```

// L3 Molecular Layer
pub mod animation;

pub use animation::ScrollAnimator;
