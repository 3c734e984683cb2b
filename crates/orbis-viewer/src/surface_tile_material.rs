//! Bevy material running the orbis surface tile program.
//!
//! The shaders are the program's own WGSL. Orbis declares the program's
//! resources in group 0; they are moved to the material bind group when the
//! shaders are registered. Draws are recorded with OpenGL clip-space depth,
//! which [`SurfaceTileUniform::from_params`] converts to Bevy's reversed
//! `[0, 1]` depth.

use std::marker::PhantomData;

use bevy::asset::uuid::Uuid;
use bevy::mesh::MeshVertexBufferLayoutRef;
use bevy::pbr::{Material, MaterialPipeline, MaterialPipelineKey, MaterialPlugin};
use bevy::prelude::*;
use bevy::render::render_resource::{
    AsBindGroup, CompareFunction, RenderPipelineDescriptor, ShaderType,
    SpecializedMeshPipelineError,
};
use bevy::shader::ShaderRef;
use orbis::gpu::{Program, SurfaceTileParams, SurfaceTileProgram};

/// UUID for the surface tile vertex shader asset.
const VERTEX_SHADER_UUID: Uuid = Uuid::from_u128(0x6f1c_2a7e_90b4_4d35_8e21_c3a9_57d0_b418);
/// UUID for the surface tile fragment shader asset.
const FRAGMENT_SHADER_UUID: Uuid = Uuid::from_u128(0x0d84_e5b2_1f63_4a9c_b7e0_9a2c_64f1_d357);

/// Maps OpenGL clip-space depth (`-w..w`, near to far) onto reversed
/// `[0, 1]` depth (near at 1).
const REVERSE_Z_FROM_GL: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

fn shader_handle(uuid: Uuid) -> Handle<Shader> {
    Handle::Uuid(uuid, PhantomData::<fn() -> Shader>)
}

/// Move a program's group 0 resources into the material bind group.
fn in_material_bind_group(source: &str) -> String {
    source.replace("@group(0)", "@group(#{MATERIAL_BIND_GROUP})")
}

/// Plugin that registers the surface tile material and its shaders.
pub struct SurfaceTileMaterialPlugin;

impl Plugin for SurfaceTileMaterialPlugin {
    fn build(&self, app: &mut App) {
        let stages = [
            (
                VERTEX_SHADER_UUID,
                SurfaceTileProgram::VERTEX_SOURCE,
                "orbis/surface_tile_vertex.wgsl",
            ),
            (
                FRAGMENT_SHADER_UUID,
                SurfaceTileProgram::FRAGMENT_SOURCE,
                "orbis/surface_tile_fragment.wgsl",
            ),
        ];
        let mut shaders = app.world_mut().resource_mut::<Assets<Shader>>();
        for (uuid, source, path) in stages {
            let shader = Shader::from_wgsl(in_material_bind_group(source), path);
            // Inserting at a UUID id cannot fail.
            let _ = shaders.insert(shader_handle(uuid).id(), shader);
        }
        app.add_plugins(MaterialPlugin::<SurfaceTileMaterial>::default());
    }
}

/// The `SurfaceTileParams` uniform block of the surface tile WGSL.
#[derive(ShaderType, Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTileUniform {
    pub mvp_matrix: Mat4,
    pub tile_coord_matrix: Mat4,
    pub tex_coord_matrix: Mat4,
    pub opacity: f32,
}

impl SurfaceTileUniform {
    /// Uniform block for a recorded draw.
    pub fn from_params(params: &SurfaceTileParams) -> Self {
        Self {
            mvp_matrix: REVERSE_Z_FROM_GL * params.mvp_matrix,
            tile_coord_matrix: params.tile_coord_matrix,
            tex_coord_matrix: params.tex_coord_matrix,
            opacity: params.opacity,
        }
    }
}

/// One surface tile draw.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct SurfaceTileMaterial {
    #[uniform(0)]
    pub params: SurfaceTileUniform,
    /// Premultiplied texture sampled by the fragment stage.
    #[texture(1)]
    #[sampler(2)]
    pub tile_texture: Handle<Image>,
    /// Position of the draw in the frame's draw stream. Later draws sort
    /// nearer so they are blended over earlier ones.
    pub order: f32,
}

impl Material for SurfaceTileMaterial {
    fn vertex_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(VERTEX_SHADER_UUID))
    }

    fn fragment_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(FRAGMENT_SHADER_UUID))
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Premultiplied
    }

    fn depth_bias(&self) -> f32 {
        self.order
    }

    fn enable_shadows() -> bool {
        false
    }

    fn enable_prepass() -> bool {
        false
    }

    fn specialize(
        _pipeline: &MaterialPipeline,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        // Positions feed `vertex_point` and UVs `vertex_tex_coord`.
        let vertex_layout = layout.0.get_layout(&[
            Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
            Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
        ])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        // Terrain winding is not normalized.
        descriptor.primitive.cull_mode = None;
        // Terrain occludes itself; equal depths let later layers paint over
        // earlier ones.
        if let Some(depth) = descriptor.depth_stencil.as_mut() {
            depth.depth_write_enabled = true;
            depth.depth_compare = CompareFunction::GreaterEqual;
        }
        Ok(())
    }
}
