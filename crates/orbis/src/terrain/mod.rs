//! Terrain tessellation.
//!
//! The globe is covered by a pyramid of tiles (see [`crate::tile`]). Each
//! frame the tessellator keeps the tiles whose bounding spheres intersect
//! the view frustum, refining them until their cells appear small enough on
//! screen. Kept tiles carry a regular grid of vertices relative to a
//! per-tile reference center, so single-precision vertex data stays exact
//! enough at globe scale.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec3;
use orbis_geom::{Globe, Sector};

use crate::error::Result;
use crate::gpu::VertexAttribute;
use crate::navigate::NavigatorState;
use crate::tile::{LevelSet, TileKey, bounding_sphere, nearest_distance};

/// Tessellation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TessellatorConfig {
    /// Size in degrees of level-zero tiles.
    pub level_zero_delta: f64,
    pub num_levels: u32,
    /// Grid cells along each side of a tile.
    pub tile_density: u32,
    /// Largest on-screen cell size in pixels before a tile is refined.
    pub detail_control: f64,
    /// Number of tiles kept in the geometry cache before it is flushed.
    pub max_cached_tiles: usize,
}

impl Default for TessellatorConfig {
    fn default() -> Self {
        Self {
            level_zero_delta: 45.0,
            num_levels: 16,
            tile_density: 16,
            detail_control: 40.0,
            max_cached_tiles: 4096,
        }
    }
}

/// Geometry of one terrain tile.
#[derive(Debug)]
pub struct TerrainTile {
    key: TileKey,
    sector: Sector,
    reference_center: DVec3,
    /// xyz per vertex, relative to the reference center.
    points: Arc<[f32]>,
    /// st per vertex, spanning `[0, 1]` over the sector with t = 0 south.
    tex_coords: Arc<[f32]>,
    indices: Arc<[u32]>,
    bounding_center: DVec3,
    bounding_radius: f64,
}

impl TerrainTile {
    #[allow(clippy::cast_possible_truncation)]
    fn build(
        globe: &Globe,
        key: TileKey,
        sector: Sector,
        density: u32,
        exaggeration: f64,
        indices: Arc<[u32]>,
    ) -> Self {
        let centroid = sector.centroid();
        let reference_center = globe.geodetic_to_cartesian(
            centroid.latitude,
            centroid.longitude,
            globe.elevation(centroid) * exaggeration,
        );

        let count = (density as usize + 1).pow(2);
        let mut points = Vec::with_capacity(count * 3);
        let mut tex_coords = Vec::with_capacity(count * 2);
        let step = 1.0 / f64::from(density);
        for j in 0..=density {
            let t = f64::from(j) * step;
            let latitude = sector.min_latitude + t * sector.delta_latitude();
            for i in 0..=density {
                let s = f64::from(i) * step;
                let longitude = sector.min_longitude + s * sector.delta_longitude();
                let location = orbis_geom::Location::new(latitude, longitude);
                let elevation = globe.elevation(location) * exaggeration;
                let point =
                    globe.geodetic_to_cartesian(latitude, longitude, elevation) - reference_center;
                points.extend_from_slice(&[point.x as f32, point.y as f32, point.z as f32]);
                tex_coords.extend_from_slice(&[s as f32, t as f32]);
            }
        }

        let (min_elevation, max_elevation) = globe.elevation_model().extreme_elevations(&sector);
        let (bounding_center, bounding_radius) = bounding_sphere(
            globe,
            &sector,
            min_elevation * exaggeration,
            max_elevation * exaggeration,
        );

        Self {
            key,
            sector,
            reference_center,
            points: Arc::from(points),
            tex_coords: Arc::from(tex_coords),
            indices,
            bounding_center,
            bounding_radius,
        }
    }

    #[must_use]
    pub fn key(&self) -> TileKey {
        self.key
    }

    #[must_use]
    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    /// Model coordinates the vertex points are relative to.
    #[must_use]
    pub fn reference_center(&self) -> DVec3 {
        self.reference_center
    }

    #[must_use]
    pub fn bounding_sphere(&self) -> (DVec3, f64) {
        (self.bounding_center, self.bounding_radius)
    }

    /// Vertex arrays bound at the given attribute locations.
    pub fn vertex_attributes(
        &self,
        point_location: u32,
        tex_coord_location: u32,
    ) -> Result<Vec<VertexAttribute>> {
        Ok(vec![
            VertexAttribute::new(point_location, 3, self.points.clone())?,
            VertexAttribute::new(tex_coord_location, 2, self.tex_coords.clone())?,
        ])
    }

    #[must_use]
    pub fn indices(&self) -> &Arc<[u32]> {
        &self.indices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.points.len() / 3
    }
}

/// Terrain tiles kept for one frame.
#[derive(Debug, Default)]
pub struct TerrainTileList {
    tiles: Vec<Arc<TerrainTile>>,
    sector: Option<Sector>,
}

impl TerrainTileList {
    fn push(&mut self, tile: Arc<TerrainTile>) {
        self.sector = Some(match self.sector {
            Some(sector) => sector.union(tile.sector()),
            None => *tile.sector(),
        });
        self.tiles.push(tile);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TerrainTile>> {
        self.tiles.iter()
    }

    /// Union of the tile sectors, or `None` when no tile is visible.
    #[must_use]
    pub fn sector(&self) -> Option<Sector> {
        self.sector
    }
}

/// Selects and builds terrain tiles for each frame.
#[derive(Debug)]
pub struct Tessellator {
    config: TessellatorConfig,
    levels: LevelSet,
    indices: Arc<[u32]>,
    cache: HashMap<TileKey, Arc<TerrainTile>>,
    cached_exaggeration: f64,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new(TessellatorConfig::default())
    }
}

impl Tessellator {
    #[must_use]
    pub fn new(config: TessellatorConfig) -> Self {
        let density = config.tile_density.max(1);
        let levels = LevelSet {
            level_zero_delta: config.level_zero_delta,
            num_levels: config.num_levels.max(1),
            tile_size: density,
        };
        Self {
            indices: grid_indices(density),
            levels,
            config: TessellatorConfig {
                tile_density: density,
                ..config
            },
            cache: HashMap::new(),
            cached_exaggeration: 1.0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TessellatorConfig {
        &self.config
    }

    /// Tessellate the part of the globe visible in `state`.
    pub fn tessellate(
        &mut self,
        globe: &Globe,
        state: &NavigatorState,
        vertical_exaggeration: f64,
    ) -> TerrainTileList {
        if vertical_exaggeration != self.cached_exaggeration
            || self.cache.len() > self.config.max_cached_tiles
        {
            tracing::debug!(
                tiles = self.cache.len(),
                vertical_exaggeration,
                "flushing terrain cache"
            );
            self.cache.clear();
            self.cached_exaggeration = vertical_exaggeration;
        }

        let mut list = TerrainTileList::default();
        for key in self.levels.level_zero_keys() {
            self.add_tile_or_descendants(globe, state, key, &mut list);
        }
        list
    }

    fn add_tile_or_descendants(
        &mut self,
        globe: &Globe,
        state: &NavigatorState,
        key: TileKey,
        list: &mut TerrainTileList,
    ) {
        let tile = self.tile(globe, key);
        let (center, radius) = tile.bounding_sphere();
        if !state
            .frustum_in_model_coordinates
            .intersects_sphere(center, radius)
        {
            return;
        }

        if self.needs_refinement(globe, state, key, tile.sector()) {
            for child in key.children() {
                self.add_tile_or_descendants(globe, state, child, list);
            }
        } else {
            list.push(tile);
        }
    }

    fn needs_refinement(
        &self,
        globe: &Globe,
        state: &NavigatorState,
        key: TileKey,
        sector: &Sector,
    ) -> bool {
        if key.level >= self.levels.last_level() {
            return false;
        }
        let distance = nearest_distance(globe, sector, 0.0, state.eye_point);
        let cell = self.levels.texel_size(key.level, globe.equatorial_radius());
        cell > self.config.detail_control * state.pixel_size_at_distance(distance)
    }

    fn tile(&mut self, globe: &Globe, key: TileKey) -> Arc<TerrainTile> {
        if let Some(tile) = self.cache.get(&key) {
            return tile.clone();
        }
        let tile = Arc::new(TerrainTile::build(
            globe,
            key,
            self.levels.tile_sector(key),
            self.config.tile_density,
            self.cached_exaggeration,
            self.indices.clone(),
        ));
        self.cache.insert(key, tile.clone());
        tile
    }
}

/// Two triangles per cell of a `density` x `density` grid.
fn grid_indices(density: u32) -> Arc<[u32]> {
    let stride = density + 1;
    let mut indices = Vec::with_capacity(density as usize * density as usize * 6);
    for j in 0..density {
        for i in 0..density {
            let sw = j * stride + i;
            let se = sw + 1;
            let nw = sw + stride;
            let ne = nw + 1;
            indices.extend_from_slice(&[sw, se, ne, sw, ne, nw]);
        }
    }
    Arc::from(indices)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orbis_geom::Location;

    use super::*;
    use crate::navigate::{Camera, Navigator, NavigatorConfig};
    use crate::view::{View, Viewport};

    fn state(camera: Camera) -> Arc<NavigatorState> {
        let view = Arc::new(View::with_viewport(Viewport::new(800, 600)));
        let config = NavigatorConfig {
            initial_camera: camera,
            ..NavigatorConfig::default()
        };
        Navigator::new(Arc::downgrade(&view), Arc::new(Globe::wgs84()), config)
            .unwrap()
            .current_state()
    }

    #[test]
    fn test_grid_indices() {
        let indices = grid_indices(2);
        assert_eq!(indices.len(), 24);
        assert_eq!(&indices[..6], &[0, 1, 4, 0, 4, 3]);
        assert!(indices.iter().all(|&i| i < 9));
    }

    #[test]
    fn test_tile_geometry_spans_sector() {
        let globe = Globe::wgs84();
        let sector = Sector::new(0.0, 45.0, 0.0, 45.0);
        let tile = TerrainTile::build(&globe, TileKey::new(0, 2, 4), sector, 4, 1.0, grid_indices(4));
        assert_eq!(tile.vertex_count(), 25);

        let attributes = tile.vertex_attributes(0, 1).unwrap();
        let first = attributes[0].fetch(0).truncate().as_dvec3() + tile.reference_center();
        let expected = globe.geodetic_to_cartesian(0.0, 0.0, 0.0);
        assert!(first.distance(expected) < 1.0);
        assert_eq!(attributes[1].fetch(24).truncate().truncate(), glam::Vec2::ONE);
    }

    #[test]
    fn test_far_view_keeps_only_facing_tiles() {
        let globe = Globe::wgs84();
        let state = state(Camera {
            look_at: Location::new(0.0, 22.5),
            range: 1.0e7,
            ..Camera::default()
        });
        let mut tessellator = Tessellator::default();
        let list = tessellator.tessellate(&globe, &state, 1.0);
        assert!(!list.is_empty());
        let sector = list.sector().unwrap();
        assert!(sector.contains(Location::new(0.0, 22.5)));
        // The far side of the globe is outside the frustum.
        assert!(list.iter().all(|t| !t.sector().contains(Location::new(0.0, -157.5))));
    }

    #[test]
    fn test_close_view_refines() {
        let globe = Globe::wgs84();
        let state = state(Camera {
            look_at: Location::new(10.0, 10.0),
            range: 5.0e4,
            ..Camera::default()
        });
        let mut tessellator = Tessellator::default();
        let list = tessellator.tessellate(&globe, &state, 1.0);
        assert!(list.iter().any(|t| t.key().level > 3));
        let sector = list.sector().unwrap();
        assert!(sector.contains(Location::new(10.0, 10.0)));
        assert!(sector.delta_longitude() < 45.0);
    }

    #[test]
    fn test_exaggeration_change_rebuilds_tiles() {
        let globe = Globe::wgs84();
        let state = state(Camera::default());
        let mut tessellator = Tessellator::default();
        let first = tessellator.tessellate(&globe, &state, 1.0);
        let again = tessellator.tessellate(&globe, &state, 1.0);
        let changed = tessellator.tessellate(&globe, &state, 2.0);

        let a = first.iter().next().unwrap();
        assert!(Arc::ptr_eq(a, again.iter().next().unwrap()));
        assert!(!Arc::ptr_eq(a, changed.iter().next().unwrap()));
    }
}
