use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use orbis_geom::Sector;

use crate::gpu::{SurfaceTile, Texture};
use crate::layer::Renderable;
use crate::render::DrawContext;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A single image stretched over a sector of the globe.
#[derive(Debug, Clone)]
pub struct SurfaceImage {
    sector: Sector,
    image: Arc<RgbaImage>,
    texture_id: Cow<'static, str>,
}

impl SurfaceImage {
    /// Create a surface image from a straight-alpha image whose first row
    /// is the northern edge of `sector`.
    #[must_use]
    pub fn new(sector: Sector, image: RgbaImage) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            sector,
            image: Arc::new(image),
            texture_id: Cow::Owned(format!("surface-image:{id}")),
        }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl SurfaceTile for SurfaceImage {
    fn sector(&self) -> &Sector {
        &self.sector
    }

    fn bind(&self, dc: &mut DrawContext) -> bool {
        let resources = dc.resources_mut();
        let texture = match resources.texture(&self.texture_id) {
            Some(texture) => texture,
            None => resources.put_texture(
                self.texture_id.clone(),
                Texture::from_image(RgbaImage::clone(&self.image)),
            ),
        };
        dc.gpu_mut().bind_texture(Some(texture));
        true
    }
}

impl Renderable for SurfaceImage {
    fn render(&self, dc: &mut DrawContext) {
        if !dc
            .visible_sector()
            .is_some_and(|visible| visible.overlaps(&self.sector))
        {
            return;
        }
        let opacity = dc.layer_opacity();
        let renderer = *dc.surface_tile_renderer();
        if let Err(e) = renderer.render_tiles(dc, &[self as &dyn SurfaceTile], opacity) {
            tracing::debug!(error = %e, "skipped surface image");
        }
    }
}
