//! Frame orchestration.
//!
//! A [`WorldWindow`] ties the pieces together: its [`Navigator`] produces a
//! [`NavigatorState`] snapshot, the [`SceneController`] tessellates terrain
//! and lets each layer record draws through the [`DrawContext`]. The
//! resulting [`Frame`] is replayed by whatever backend owns the surface.
//!
//! [`Navigator`]: crate::navigate::Navigator
//! [`NavigatorState`]: crate::navigate::NavigatorState

mod draw_context;
mod scene;
mod stats;
mod world_window;

pub use draw_context::DrawContext;
pub use scene::{Frame, SceneConfig, SceneController};
pub use stats::FrameStatistics;
pub use world_window::{WorldWindow, WorldWindowConfig};
