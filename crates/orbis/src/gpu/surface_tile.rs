//! Program for drawing textured surface tiles onto terrain.
//!
//! Terrain geometry carries texture coordinates spanning `[0, 1]` over its
//! tile. Two matrices remap them per draw: the tile-coordinate matrix maps
//! into `[0, 1]` over the geographic region of the surface tile being drawn,
//! and fragments falling outside that square come out fully transparent; the
//! texture-coordinate matrix maps into the bound texture. The sampled,
//! premultiplied color is scaled by the opacity uniform.

use std::sync::Arc;

use glam::{DMat4, Mat4};

use crate::error::{Error, Result};
use crate::gpu::context::{DrawCommand, GpuContext, UniformValue, texture_unit_index};
use crate::gpu::program::{GpuProgram, Program, ProgramKey, UniformSlot};

const VERTEX_SOURCE: &str = r"
struct SurfaceTileParams {
    mvp_matrix: mat4x4<f32>,
    tile_coord_matrix: mat4x4<f32>,
    tex_coord_matrix: mat4x4<f32>,
    opacity: f32,
};

@group(0) @binding(0) var<uniform> params: SurfaceTileParams;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tile_coord: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
};

@vertex
fn vertex(
    @location(0) vertex_point: vec4<f32>,
    @location(1) vertex_tex_coord: vec4<f32>,
) -> VertexOutput {
    var output: VertexOutput;
    output.position = params.mvp_matrix * vertex_point;
    output.tile_coord = (params.tile_coord_matrix * vertex_tex_coord).xy;
    output.tex_coord = (params.tex_coord_matrix * vertex_tex_coord).xy;
    return output;
}
";

const FRAGMENT_SOURCE: &str = r"
struct SurfaceTileParams {
    mvp_matrix: mat4x4<f32>,
    tile_coord_matrix: mat4x4<f32>,
    tex_coord_matrix: mat4x4<f32>,
    opacity: f32,
};

@group(0) @binding(0) var<uniform> params: SurfaceTileParams;
@group(0) @binding(1) var tile_texture: texture_2d<f32>;
@group(0) @binding(2) var tile_sampler: sampler;

@fragment
fn fragment(
    @location(0) tile_coord: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
) -> @location(0) vec4<f32> {
    // One inside [0, 1) on both axes, zero elsewhere.
    let inside = step(vec2<f32>(0.0), tile_coord) * (vec2<f32>(1.0) - step(vec2<f32>(1.0), tile_coord));
    let mask = inside.x * inside.y;
    return mask * params.opacity * textureSample(tile_texture, tile_sampler, tex_coord);
}
";

/// Uniform values of one surface tile draw, matching the WGSL parameter
/// block plus the sampled texture unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTileParams {
    pub mvp_matrix: Mat4,
    pub tile_coord_matrix: Mat4,
    pub tex_coord_matrix: Mat4,
    pub opacity: f32,
    /// Zero-based index of the sampled texture unit.
    pub texture_unit: i32,
}

/// The surface tile program with its slots resolved.
#[derive(Debug, Clone)]
pub struct SurfaceTileProgram {
    program: Arc<GpuProgram>,
    vertex_point_location: u32,
    vertex_tex_coord_location: u32,
    mvp_matrix: UniformSlot,
    tile_coord_matrix: UniformSlot,
    tex_coord_matrix: UniformSlot,
    opacity: UniformSlot,
    tile_texture: UniformSlot,
}

impl Program for SurfaceTileProgram {
    const KEY: ProgramKey = "orbis.surface_tile_program";
    const VERTEX_SOURCE: &'static str = VERTEX_SOURCE;
    const FRAGMENT_SOURCE: &'static str = FRAGMENT_SOURCE;

    fn from_linked(program: Arc<GpuProgram>) -> Result<Self> {
        let key = program.key();
        let attribute = |name: &str| {
            program.attribute_location(name).ok_or_else(|| Error::ProgramLink {
                key,
                message: format!("missing vertex attribute {name}"),
            })
        };
        let uniform = |name: &str| {
            program.uniform_slot(name).ok_or_else(|| Error::ProgramLink {
                key,
                message: format!("missing uniform {name}"),
            })
        };

        Ok(Self {
            vertex_point_location: attribute("vertex_point")?,
            vertex_tex_coord_location: attribute("vertex_tex_coord")?,
            mvp_matrix: uniform("mvp_matrix")?,
            tile_coord_matrix: uniform("tile_coord_matrix")?,
            tex_coord_matrix: uniform("tex_coord_matrix")?,
            opacity: uniform("opacity")?,
            tile_texture: uniform("tile_texture")?,
            program,
        })
    }
}

impl SurfaceTileProgram {
    /// Compile, link and wrap a fresh instance.
    ///
    /// Layers normally go through
    /// [`DrawContext::find_and_bind_program`](crate::render::DrawContext::find_and_bind_program)
    /// instead so that one instance is shared.
    pub fn new() -> Result<Self> {
        Self::from_linked(Arc::new(Self::create()?))
    }

    #[must_use]
    pub fn program(&self) -> &Arc<GpuProgram> {
        &self.program
    }

    /// Attribute location for vertex points.
    #[must_use]
    pub fn vertex_point_location(&self) -> u32 {
        self.vertex_point_location
    }

    /// Attribute location for vertex texture coordinates.
    #[must_use]
    pub fn vertex_tex_coord_location(&self) -> u32 {
        self.vertex_tex_coord_location
    }

    /// Load the modelview-projection matrix. This program must be bound.
    pub fn load_modelview_projection(&self, gpu: &mut GpuContext, matrix: &DMat4) {
        self.load_matrix(gpu, self.mvp_matrix, matrix);
    }

    /// Load the matrix mapping terrain texture coordinates into `[0, 1]`
    /// over the surface tile. This program must be bound.
    pub fn load_tile_coord_matrix(&self, gpu: &mut GpuContext, matrix: &DMat4) {
        self.load_matrix(gpu, self.tile_coord_matrix, matrix);
    }

    /// Load the matrix mapping terrain texture coordinates into the bound
    /// texture. This program must be bound.
    pub fn load_texture_matrix(&self, gpu: &mut GpuContext, matrix: &DMat4) {
        self.load_matrix(gpu, self.tex_coord_matrix, matrix);
    }

    /// Select the texture unit sampled by the fragment stage.
    ///
    /// `unit` is a texture unit enumerant (`TEXTURE0 + n`). Anything else is
    /// rejected before the uniform is touched. This program must be bound.
    #[allow(clippy::cast_possible_wrap)]
    pub fn load_texture_unit(&self, gpu: &mut GpuContext, unit: u32) -> Result<()> {
        let index = texture_unit_index(unit)?;
        self.debug_assert_bound(gpu);
        gpu.set_uniform(self.tile_texture, UniformValue::Int(index as i32));
        Ok(())
    }

    /// Load the opacity that scales the sampled color.
    ///
    /// The value is passed through unclamped: values outside `[0, 1]`
    /// produce correspondingly out-of-range blending. This program must be
    /// bound.
    #[allow(clippy::cast_possible_truncation)]
    pub fn load_opacity(&self, gpu: &mut GpuContext, opacity: f64) {
        self.debug_assert_bound(gpu);
        gpu.set_uniform(self.opacity, UniformValue::Float(opacity as f32));
    }

    /// Uniforms recorded with a draw made with this program.
    ///
    /// Uniforms that were never loaded read as zero, as on a GPU.
    #[must_use]
    pub fn params(&self, draw: &DrawCommand) -> SurfaceTileParams {
        let matrix = |slot: UniformSlot| draw.uniform(slot).as_mat4().unwrap_or(Mat4::ZERO);
        SurfaceTileParams {
            mvp_matrix: matrix(self.mvp_matrix),
            tile_coord_matrix: matrix(self.tile_coord_matrix),
            tex_coord_matrix: matrix(self.tex_coord_matrix),
            opacity: draw.uniform(self.opacity).as_float().unwrap_or(0.0),
            texture_unit: draw.uniform(self.tile_texture).as_int().unwrap_or(0),
        }
    }

    fn load_matrix(&self, gpu: &mut GpuContext, slot: UniformSlot, matrix: &DMat4) {
        self.debug_assert_bound(gpu);
        gpu.set_uniform(slot, UniformValue::Mat4(matrix.as_mat4()));
    }

    fn debug_assert_bound(&self, gpu: &GpuContext) {
        debug_assert!(
            gpu.current_program()
                .is_some_and(|p| Arc::ptr_eq(p, &self.program)),
            "{} is not the bound program",
            Self::KEY
        );
    }
}
