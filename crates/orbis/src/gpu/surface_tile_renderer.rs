//! Draws textured surface tiles onto the tessellated terrain.

use glam::{DMat4, DVec4};
use orbis_geom::Sector;

use crate::error::Result;
use crate::gpu::context::{DrawState, TEXTURE0, texture_unit_index};
use crate::gpu::surface_tile::SurfaceTileProgram;
use crate::render::DrawContext;

/// Flips the t axis so that t = 0 addresses the top row of a texture.
const UNIT_Y_FLIP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, -1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 1.0, 0.0),
    DVec4::new(0.0, 1.0, 0.0, 1.0),
);

/// A textured region of the globe that can be draped over terrain.
pub trait SurfaceTile {
    /// Region covered by the texture.
    fn sector(&self) -> &Sector;

    /// Bind the tile's texture to the active texture unit.
    ///
    /// Returns `false` when no texture is available, in which case the tile
    /// is not drawn.
    fn bind(&self, dc: &mut DrawContext) -> bool;

    /// Adjust the texture matrix before the y flip is applied.
    ///
    /// Tiles drawn with a texture covering a larger sector than their own
    /// map their `[0, 1]` range into that texture here.
    fn apply_internal_transform(&self, _matrix: &mut DMat4) {}
}

/// Renders [`SurfaceTile`]s with the [`SurfaceTileProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceTileRenderer {
    texture_unit: u32,
}

impl Default for SurfaceTileRenderer {
    fn default() -> Self {
        Self {
            texture_unit: TEXTURE0,
        }
    }
}

impl SurfaceTileRenderer {
    /// Create a renderer sampling from `texture_unit` (`TEXTURE0 + n`).
    pub fn new(texture_unit: u32) -> Result<Self> {
        texture_unit_index(texture_unit)?;
        Ok(Self { texture_unit })
    }

    #[must_use]
    pub fn texture_unit(&self) -> u32 {
        self.texture_unit
    }

    /// Draw every surface tile over every terrain tile it overlaps.
    ///
    /// Returns the number of draws issued. Fails when the program cannot be
    /// built; nothing is drawn in that case.
    pub fn render_tiles(
        &self,
        dc: &mut DrawContext,
        surface_tiles: &[&dyn SurfaceTile],
        opacity: f64,
    ) -> Result<usize> {
        let Some(terrain) = dc.surface_geometry().cloned() else {
            return Ok(0);
        };
        if surface_tiles.is_empty() || terrain.is_empty() {
            return Ok(0);
        }

        let program = dc.find_and_bind_program::<SurfaceTileProgram>()?;
        dc.gpu_mut().active_texture(self.texture_unit)?;
        program.load_texture_unit(dc.gpu_mut(), self.texture_unit)?;
        program.load_opacity(dc.gpu_mut(), opacity);

        let modelview_projection = dc.navigator_state().modelview_projection;
        let mut draws = 0;

        for terrain_tile in terrain.iter() {
            let mut mvp_loaded = false;

            for surface_tile in surface_tiles {
                let surface_sector = surface_tile.sector();
                if !surface_sector.overlaps(terrain_tile.sector()) {
                    continue;
                }
                if !surface_tile.bind(dc) {
                    continue;
                }

                if !mvp_loaded {
                    let mvp = modelview_projection
                        * DMat4::from_translation(terrain_tile.reference_center());
                    program.load_modelview_projection(dc.gpu_mut(), &mvp);
                    mvp_loaded = true;
                }

                let mask = tile_coord_matrix(terrain_tile.sector(), surface_sector);
                program.load_tile_coord_matrix(dc.gpu_mut(), &mask);

                let mut internal = DMat4::IDENTITY;
                surface_tile.apply_internal_transform(&mut internal);
                program.load_texture_matrix(dc.gpu_mut(), &(UNIT_Y_FLIP * internal * mask));

                let attributes = terrain_tile.vertex_attributes(
                    program.vertex_point_location(),
                    program.vertex_tex_coord_location(),
                )?;
                dc.gpu_mut().draw_elements(
                    attributes,
                    terrain_tile.indices().clone(),
                    DrawState::default(),
                );
                draws += 1;
            }
        }

        dc.statistics_mut().surface_tile_draws += draws;
        Ok(draws)
    }
}

/// Matrix mapping `[0, 1]` coordinates over `terrain` into `[0, 1]` over
/// `surface`.
#[must_use]
pub fn tile_coord_matrix(terrain: &Sector, surface: &Sector) -> DMat4 {
    let surface_dlon = surface.delta_longitude();
    let surface_dlat = surface.delta_latitude();

    let (s_scale, s_trans) = if surface_dlon > 0.0 {
        (
            terrain.delta_longitude() / surface_dlon,
            -(surface.min_longitude - terrain.min_longitude) / surface_dlon,
        )
    } else {
        (1.0, 0.0)
    };
    let (t_scale, t_trans) = if surface_dlat > 0.0 {
        (
            terrain.delta_latitude() / surface_dlat,
            -(surface.min_latitude - terrain.min_latitude) / surface_dlat,
        )
    } else {
        (1.0, 0.0)
    };

    DMat4::from_cols(
        DVec4::new(s_scale, 0.0, 0.0, 0.0),
        DVec4::new(0.0, t_scale, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::new(s_trans, t_trans, 0.0, 1.0),
    )
}
