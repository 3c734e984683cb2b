//! Multi-resolution imagery draped over the terrain.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{DMat4, DVec4};
use orbis_geom::Sector;

use crate::gpu::{SurfaceTile, Texture};
use crate::layer::{Layer, LayerProperties, TileFetch, TileSource};
use crate::render::DrawContext;
use crate::tile::{LevelSet, TileKey, bounding_sphere, nearest_distance};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A tile chosen for drawing, possibly showing part of an ancestor's
/// texture while its own is not available.
struct SelectedTile {
    sector: Sector,
    texture: Arc<Texture>,
    texture_sector: Sector,
}

impl SurfaceTile for SelectedTile {
    fn sector(&self) -> &Sector {
        &self.sector
    }

    fn bind(&self, dc: &mut DrawContext) -> bool {
        dc.gpu_mut().bind_texture(Some(self.texture.clone()));
        true
    }

    fn apply_internal_transform(&self, matrix: &mut DMat4) {
        if self.texture_sector == self.sector {
            return;
        }
        let outer = &self.texture_sector;
        let s_scale = self.sector.delta_longitude() / outer.delta_longitude();
        let t_scale = self.sector.delta_latitude() / outer.delta_latitude();
        let s_trans = (self.sector.min_longitude - outer.min_longitude) / outer.delta_longitude();
        let t_trans = (self.sector.min_latitude - outer.min_latitude) / outer.delta_latitude();
        let to_outer = DMat4::from_cols(
            DVec4::new(s_scale, 0.0, 0.0, 0.0),
            DVec4::new(0.0, t_scale, 0.0, 0.0),
            DVec4::new(0.0, 0.0, 1.0, 0.0),
            DVec4::new(s_trans, t_trans, 0.0, 1.0),
        );
        *matrix = to_outer * *matrix;
    }
}

#[derive(Clone)]
struct Fallback {
    sector: Sector,
    texture: Arc<Texture>,
}

/// Imagery from a [`TileSource`] at a resolution matched to the view.
///
/// Each frame the layer walks the tile pyramid over the visible sector,
/// refining tiles whose texels would appear larger than `detail_control`
/// pixels. Tiles whose imagery is not ready yet are drawn with the
/// nearest ancestor's texture.
pub struct TiledImageLayer {
    properties: LayerProperties,
    source: Arc<dyn TileSource>,
    levels: LevelSet,
    detail_control: f64,
    id: u64,
    /// Tiles the source reported absent.
    absent: Mutex<HashSet<TileKey>>,
}

impl TiledImageLayer {
    #[must_use]
    pub fn new(name: impl Into<String>, source: Arc<dyn TileSource>) -> Self {
        Self::with_levels(name, source, LevelSet::default())
    }

    #[must_use]
    pub fn with_levels(name: impl Into<String>, source: Arc<dyn TileSource>, levels: LevelSet) -> Self {
        Self {
            properties: LayerProperties::new(name),
            source,
            levels,
            detail_control: 1.5,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            absent: Mutex::new(HashSet::new()),
        }
    }

    /// Largest on-screen texel size in pixels before a tile is refined.
    #[must_use]
    pub fn with_detail_control(mut self, detail_control: f64) -> Self {
        self.detail_control = detail_control.max(f64::MIN_POSITIVE);
        self
    }

    #[must_use]
    pub fn levels(&self) -> &LevelSet {
        &self.levels
    }

    fn texture_id(&self, key: TileKey) -> String {
        format!(
            "tiled-image:{}:{}/{}/{}",
            self.id, key.level, key.row, key.column
        )
    }

    /// The tile's texture, fetching it from the source on a cache miss.
    fn texture(&self, dc: &mut DrawContext, key: TileKey, sector: &Sector) -> Option<Arc<Texture>> {
        let id = self.texture_id(key);
        if let Some(texture) = dc.resources_mut().texture(&id) {
            return Some(texture);
        }
        if self.absent_tiles().contains(&key) {
            return None;
        }
        // Sources may block or take their own locks; fetch with the set
        // released.
        match self.source.fetch(key, sector, self.levels.tile_size) {
            TileFetch::Ready(image) => {
                let texture = Texture::from_image(Arc::unwrap_or_clone(image));
                Some(dc.resources_mut().put_texture(id, texture))
            }
            TileFetch::Pending => None,
            TileFetch::Absent => {
                tracing::trace!(?key, "tile absent from source");
                self.absent_tiles().insert(key);
                None
            }
        }
    }

    fn absent_tiles(&self) -> MutexGuard<'_, HashSet<TileKey>> {
        self.absent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn needs_refinement(&self, dc: &DrawContext, key: TileKey, sector: &Sector) -> bool {
        if key.level >= self.levels.last_level() {
            return false;
        }
        let state = dc.navigator_state();
        let globe = dc.globe();
        let distance = nearest_distance(globe, sector, 0.0, state.eye_point);
        let texel = self.levels.texel_size(key.level, globe.equatorial_radius());
        texel > self.detail_control * state.pixel_size_at_distance(distance)
    }

    fn select(
        &self,
        dc: &mut DrawContext,
        visible: &Sector,
        key: TileKey,
        fallback: Option<&Fallback>,
        selected: &mut Vec<SelectedTile>,
    ) {
        let sector = self.levels.tile_sector(key);
        if !sector.overlaps(visible) {
            return;
        }
        let exaggeration = dc.vertical_exaggeration();
        let (min_elevation, max_elevation) = dc.globe().elevation_model().extreme_elevations(&sector);
        let (center, radius) = bounding_sphere(
            dc.globe(),
            &sector,
            min_elevation * exaggeration,
            max_elevation * exaggeration,
        );
        if !dc
            .navigator_state()
            .frustum_in_model_coordinates
            .intersects_sphere(center, radius)
        {
            return;
        }

        let own = self.texture(dc, key, &sector).map(|texture| Fallback { sector, texture });

        if self.needs_refinement(dc, key, &sector) {
            let fallback = own.as_ref().or(fallback);
            for child in key.children() {
                self.select(dc, visible, child, fallback, selected);
            }
            return;
        }

        if let Some(chosen) = own.as_ref().or(fallback) {
            selected.push(SelectedTile {
                sector,
                texture: chosen.texture.clone(),
                texture_sector: chosen.sector,
            });
        }
    }
}

impl Layer for TiledImageLayer {
    fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    fn render(&self, dc: &mut DrawContext) {
        let Some(visible) = dc.visible_sector() else {
            return;
        };

        let mut selected = Vec::new();
        for key in self.levels.level_zero_keys() {
            self.select(dc, &visible, key, None, &mut selected);
        }
        if selected.is_empty() {
            return;
        }

        let tiles: Vec<&dyn SurfaceTile> = selected.iter().map(|t| t as &dyn SurfaceTile).collect();
        let opacity = dc.layer_opacity();
        let renderer = *dc.surface_tile_renderer();
        match renderer.render_tiles(dc, &tiles, opacity) {
            Ok(_) => dc.statistics_mut().image_tiles += selected.len(),
            Err(e) => tracing::debug!(layer = self.name(), error = %e, "skipped tiled imagery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::{OnceLock, Weak};

    use orbis_geom::Globe;

    use super::*;
    use crate::gpu::GpuResourceCache;

    /// Reports every tile absent, noting whether the layer's absent set was
    /// free while it was asked.
    #[derive(Debug, Default)]
    struct AbsentSource {
        layer: OnceLock<Weak<TiledImageLayer>>,
        fetches: AtomicUsize,
        set_was_locked: AtomicBool,
    }

    impl TileSource for AbsentSource {
        fn fetch(&self, _key: TileKey, _sector: &Sector, _tile_size: u32) -> TileFetch {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let locked = self
                .layer
                .get()
                .and_then(Weak::upgrade)
                .is_some_and(|layer| layer.absent.try_lock().is_err());
            if locked {
                self.set_was_locked.store(true, Ordering::SeqCst);
            }
            TileFetch::Absent
        }
    }

    #[test]
    fn test_absent_tiles_are_recorded_without_holding_lock_during_fetch() {
        let source = Arc::new(AbsentSource::default());
        let layer = Arc::new(TiledImageLayer::new("absent", source.clone()));
        source.layer.set(Arc::downgrade(&layer)).unwrap();

        let mut dc = DrawContext::new(Arc::new(Globe::wgs84()), GpuResourceCache::default());
        let key = TileKey::new(0, 0, 0);
        let sector = layer.levels().tile_sector(key);

        assert!(layer.texture(&mut dc, key, &sector).is_none());
        assert!(!source.set_was_locked.load(Ordering::SeqCst));
        assert!(layer.absent_tiles().contains(&key));

        // Known absent tiles are not fetched again.
        assert!(layer.texture(&mut dc, key, &sector).is_none());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_internal_transform_maps_child_into_ancestor() {
        let levels = LevelSet::default();
        let parent = TileKey::new(0, 2, 4);
        let child = parent.children()[3];
        let tile = SelectedTile {
            sector: levels.tile_sector(child),
            texture: Arc::new(Texture::solid([0, 0, 0, 255])),
            texture_sector: levels.tile_sector(parent),
        };
        let mut matrix = DMat4::IDENTITY;
        tile.apply_internal_transform(&mut matrix);

        // The north-east child covers the upper-right quarter.
        let origin = matrix * DVec4::new(0.0, 0.0, 0.0, 1.0);
        let corner = matrix * DVec4::new(1.0, 1.0, 0.0, 1.0);
        assert!((origin.x - 0.5).abs() < 1e-12 && (origin.y - 0.5).abs() < 1e-12);
        assert!((corner.x - 1.0).abs() < 1e-12 && (corner.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_own_texture_needs_no_transform() {
        let sector = Sector::new(0.0, 45.0, 0.0, 45.0);
        let tile = SelectedTile {
            sector,
            texture: Arc::new(Texture::solid([0, 0, 0, 255])),
            texture_sector: sector,
        };
        let mut matrix = DMat4::IDENTITY;
        tile.apply_internal_transform(&mut matrix);
        assert_eq!(matrix, DMat4::IDENTITY);
    }
}
