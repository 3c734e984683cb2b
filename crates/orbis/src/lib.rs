//! A 3D virtual globe core.
//!
//! This crate renders imagery draped over an ellipsoidal globe. It provides:
//! - [`navigate`]: A look-at camera driven by gestures and animations, with
//!   immutable per-frame [`NavigatorState`](navigate::NavigatorState) snapshots
//! - [`layer`]: Ordered layers, surface images and multi-resolution imagery
//! - [`terrain`]: View-dependent tessellation of the globe into tiles
//! - [`gpu`]: WGSL programs, a resource cache and a recorded draw stream
//!   for a backend to replay
//! - [`render`]: The per-frame draw context, the scene controller and the
//!   [`WorldWindow`](render::WorldWindow) tying them together
//!
//! Geometry lives in [`orbis_geom`], re-exported here as [`geom`].

pub mod error;
pub mod gpu;
pub mod layer;
pub mod navigate;
pub mod render;
pub mod terrain;
pub mod tile;
pub mod view;

pub use error::{Error, Result};
pub use orbis_geom as geom;
