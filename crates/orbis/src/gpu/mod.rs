//! GPU programs, state, resources and backends.
//!
//! Layers never talk to a graphics API directly. They bind programs and load
//! uniforms on the [`GpuContext`] and issue draws, which are recorded into a
//! draw stream. A backend then replays the stream, compiling each program's
//! WGSL into a pipeline and feeding it the recorded uniforms.

pub mod context;
pub mod program;
pub mod resource_cache;
#[cfg(test)]
pub(crate) mod software;
pub mod surface_tile;
pub mod surface_tile_renderer;
pub mod texture;

pub use context::{
    DrawCommand, DrawState, GpuContext, MAX_ATTRIBUTE_COMPONENTS, MAX_TEXTURE_UNITS, TEXTURE0,
    UniformValue, VertexAttribute,
};
pub use program::{GpuProgram, Program, ProgramKey, UniformKind, UniformSlot};
pub use resource_cache::{GpuResource, GpuResourceCache, ResourceKey, ResourceKind};
pub use surface_tile::{SurfaceTileParams, SurfaceTileProgram};
pub use surface_tile_renderer::{SurfaceTile, SurfaceTileRenderer};
pub use texture::Texture;
