//! The globe view: an orbis world window drawn with Bevy.
//!
//! Each frame that needs a redraw, the world window records a draw stream.
//! Every surface tile draw becomes an entity with a [`SurfaceTileMaterial`]
//! carrying the draw's uniforms, so the program's WGSL runs on the GPU.
//! Meshes and textures are shared between frames as long as the draw
//! stream keeps referring to the same terrain geometry and tile textures.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::asset::RenderAssetUsages;
use bevy::camera::ClearColorConfig;
use bevy::camera::visibility::NoFrustumCulling;
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::window::PrimaryWindow;
use orbis::gpu::{DrawCommand, Program, SurfaceTileProgram, Texture, VertexAttribute};
use orbis::layer::{GraticuleTileSource, ImageTileSource, TiledImageLayer};
use orbis::navigate::{Camera as GlobeCamera, NavigatorConfig};
use orbis::render::{SceneConfig, WorldWindow, WorldWindowConfig};
use orbis::view::Viewport;
use orbis_geom::Location;

use crate::launch_params::LaunchParams;
use crate::loader::{ImageryChannels, spawn_imagery_load};
use crate::surface_tile_material::{
    SurfaceTileMaterial, SurfaceTileMaterialPlugin, SurfaceTileUniform,
};

/// Plugin for the globe view.
pub struct GlobePlugin;

impl Plugin for GlobePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(SurfaceTileMaterialPlugin)
            .init_resource::<DrawResources>()
            .add_systems(Startup, setup_globe)
            .add_systems(Update, (resize_globe, draw_globe).chain());
    }
}

/// The world window shown in the primary window.
#[derive(Resource)]
pub struct GlobeView {
    pub window: WorldWindow,
}

/// Marker for entities drawing one recorded surface tile draw.
#[derive(Component)]
struct SurfaceTileDraw;

/// Identity of a terrain mesh: the vertex and index arrays it was built
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MeshKey {
    points: usize,
    tex_coords: usize,
    indices: usize,
}

impl MeshKey {
    fn new(points: &VertexAttribute, tex_coords: &VertexAttribute, indices: &Arc<[u32]>) -> Self {
        Self {
            points: Arc::as_ptr(points.data()).cast::<f32>().addr(),
            tex_coords: Arc::as_ptr(tex_coords.data()).cast::<f32>().addr(),
            indices: Arc::as_ptr(indices).cast::<u32>().addr(),
        }
    }
}

struct CachedMesh {
    /// Keeps the arrays alive so their addresses stay unique.
    _arrays: [Arc<[f32]>; 2],
    _indices: Arc<[u32]>,
    handle: Handle<Mesh>,
    used: bool,
}

struct CachedTexture {
    _texture: Arc<Texture>,
    handle: Handle<Image>,
    used: bool,
}

/// Bevy meshes and images backing the draws on screen.
#[derive(Resource)]
struct DrawResources {
    meshes: HashMap<MeshKey, CachedMesh>,
    textures: HashMap<usize, CachedTexture>,
    /// Sampled when a draw has no texture on its unit.
    unbound_texture: Arc<Texture>,
}

impl Default for DrawResources {
    fn default() -> Self {
        Self {
            meshes: HashMap::new(),
            textures: HashMap::new(),
            unbound_texture: Arc::new(Texture::solid([0, 0, 0, 255])),
        }
    }
}

impl DrawResources {
    /// Mesh and material for a recorded draw, or `None` for draws this
    /// backend cannot replay.
    fn prepare(
        &mut self,
        draw: &DrawCommand,
        order: usize,
        meshes: &mut Assets<Mesh>,
        images: &mut Assets<Image>,
    ) -> Option<(Handle<Mesh>, SurfaceTileMaterial)> {
        let program = SurfaceTileProgram::from_linked(draw.program.clone()).ok()?;
        let params = program.params(draw);
        let points = draw.attribute(program.vertex_point_location())?;
        let tex_coords = draw.attribute(program.vertex_tex_coord_location())?;

        let key = MeshKey::new(points, tex_coords, &draw.indices);
        let mesh = self.meshes.entry(key).or_insert_with(|| CachedMesh {
            _arrays: [points.data().clone(), tex_coords.data().clone()],
            _indices: draw.indices.clone(),
            handle: meshes.add(terrain_mesh(points, tex_coords, &draw.indices)),
            used: false,
        });
        mesh.used = true;
        let mesh = mesh.handle.clone();

        let texture = draw
            .texture(params.texture_unit)
            .unwrap_or(&self.unbound_texture)
            .clone();
        let cached = self
            .textures
            .entry(Arc::as_ptr(&texture).addr())
            .or_insert_with(|| CachedTexture {
                handle: images.add(texture_image(&texture)),
                _texture: texture,
                used: false,
            });
        cached.used = true;

        #[allow(clippy::cast_precision_loss)]
        let material = SurfaceTileMaterial {
            params: SurfaceTileUniform::from_params(&params),
            tile_texture: cached.handle.clone(),
            order: order as f32,
        };
        Some((mesh, material))
    }

    /// Drop meshes and textures no draw of the last frame used.
    fn release_unused(&mut self) {
        self.meshes.retain(|_, mesh| std::mem::take(&mut mesh.used));
        self.textures
            .retain(|_, texture| std::mem::take(&mut texture.used));
    }
}

/// Build a mesh from a draw's vertex arrays.
#[allow(clippy::cast_possible_truncation)]
fn terrain_mesh(points: &VertexAttribute, tex_coords: &VertexAttribute, indices: &[u32]) -> Mesh {
    let count = points.vertex_count() as u32;
    let positions: Vec<[f32; 3]> = (0..count)
        .map(|i| points.fetch(i).truncate().to_array())
        .collect();
    let uvs: Vec<[f32; 2]> = (0..count)
        .map(|i| tex_coords.fetch(i).truncate().truncate().to_array())
        .collect();

    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
    .with_inserted_indices(Indices::U32(indices.to_vec()))
}

/// Upload a premultiplied texture.
fn texture_image(texture: &Texture) -> Image {
    Image::new(
        Extent3d {
            width: texture.width(),
            height: texture.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        texture.image().as_raw().clone(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD,
    )
}

fn create_window(params: &LaunchParams) -> orbis::Result<WorldWindow> {
    let config = WorldWindowConfig {
        navigator: NavigatorConfig {
            initial_camera: GlobeCamera {
                look_at: Location::new(params.lat, params.lon),
                range: params.range,
                heading: params.heading,
                tilt: params.tilt,
            },
            ..NavigatorConfig::default()
        },
        scene: SceneConfig {
            vertical_exaggeration: params.exaggeration,
            ..SceneConfig::default()
        },
        ..WorldWindowConfig::default()
    };
    WorldWindow::new(Viewport::new(params.width, params.height), config)
}

/// Create the world window, its layers and the camera.
#[allow(clippy::needless_pass_by_value)]
fn setup_globe(mut commands: Commands, params: Res<LaunchParams>, channels: Res<ImageryChannels>) {
    let mut window = match create_window(&params) {
        Ok(window) => window,
        Err(e) => {
            tracing::error!(error = %e, "invalid launch camera, using defaults");
            match WorldWindow::new(
                Viewport::new(params.width, params.height),
                WorldWindowConfig::default(),
            ) {
                Ok(window) => window,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create world window");
                    return;
                }
            }
        }
    };

    window.layers_mut().add_layer(Arc::new(TiledImageLayer::new(
        "Graticule",
        Arc::new(GraticuleTileSource::default()),
    )));

    if let Some(path) = &params.imagery {
        let source = Arc::new(ImageTileSource::pending());
        let layer = TiledImageLayer::new("Imagery", source.clone());
        window.layers_mut().add_layer(Arc::new(layer));
        spawn_imagery_load(path.clone(), source, &channels);
    }

    let names: Vec<&str> = window.layers().iter().map(|layer| layer.name()).collect();
    tracing::info!(?names, "layers ready");

    let [r, g, b, a] = window.scene().config().clear_color;
    // The draws carry their own projection; the camera only provides the
    // render target and the depth buffer.
    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::linear_rgba(r, g, b, a)),
            ..default()
        },
        Tonemapping::None,
        Transform::IDENTITY,
    ));

    commands.insert_resource(GlobeView { window });
}

/// Keep the navigator viewport in step with the window.
#[allow(
    clippy::needless_pass_by_value,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn resize_globe(globe: Option<ResMut<GlobeView>>, window: Single<&Window, With<PrimaryWindow>>) {
    let Some(mut globe) = globe else {
        return;
    };
    let target = Viewport::new(
        (window.width().round() as u32).max(1),
        (window.height().round() as u32).max(1),
    );
    if globe.window.view().viewport() != Some(target) {
        tracing::debug!(width = target.width, height = target.height, "resizing globe");
        globe.window.resize(target.width, target.height);
    }
}

/// Record a frame when one is needed and replace the draw entities with
/// its draws.
#[allow(clippy::too_many_arguments)]
fn draw_globe(
    mut commands: Commands,
    globe: Option<ResMut<GlobeView>>,
    mut resources: ResMut<DrawResources>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<SurfaceTileMaterial>>,
    drawn: Query<Entity, With<SurfaceTileDraw>>,
) {
    let Some(mut globe) = globe else {
        return;
    };
    if !globe.window.needs_redraw() {
        return;
    }

    let frame = globe.window.render();
    for entity in &drawn {
        commands.entity(entity).despawn();
    }

    let mut skipped = 0;
    for (order, draw) in frame.commands.iter().enumerate() {
        let Some((mesh, material)) = resources.prepare(draw, order, &mut meshes, &mut images)
        else {
            skipped += 1;
            continue;
        };
        commands.spawn((
            SurfaceTileDraw,
            Mesh3d(mesh),
            MeshMaterial3d(materials.add(material)),
            Transform::IDENTITY,
            NoFrustumCulling,
        ));
    }
    resources.release_unused();

    if skipped > 0 {
        tracing::warn!(skipped, "draws with no surface tile program were not replayed");
    }
}
