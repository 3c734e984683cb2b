//! Geodetic and geometric primitives for globe rendering.
//!
//! This crate holds the pure math the renderer is built on: geographic
//! locations and the great-circle and rhumb-line paths between them,
//! geographic sectors, the ellipsoidal globe with its Cartesian conversions,
//! and the planes, frustums and camera matrices used to look at it.
//!
//! # Design principles
//!
//! - **Pure**: No I/O, no logging, no interior mutability
//! - **Value types**: Locations, sectors, planes and frustums are `Copy`
//! - **Double precision**: Globe-scale coordinates use `glam`'s `f64` types

pub mod angle;
mod error;
pub mod frustum;
pub mod globe;
pub mod location;
pub mod matrix;
pub mod plane;
pub mod sector;

pub use error::{GeomError, GeomResult};
pub use frustum::Frustum;
pub use globe::{ElevationModel, Globe, ZeroElevationModel};
pub use location::{Location, Position};
pub use plane::Plane;
pub use sector::Sector;

// Re-export glam so downstream crates agree on the math types.
pub use glam;
