//! Imagery providers for tiled layers.
//!
//! Sources never block. A source that is still waiting on its data answers
//! [`TileFetch::Pending`] and the layer asks again on a later frame.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use orbis_geom::Sector;

use crate::tile::TileKey;

/// Outcome of asking a source for a tile.
#[derive(Debug, Clone)]
pub enum TileFetch {
    /// The tile image, straight alpha.
    Ready(Arc<RgbaImage>),
    /// Not available yet; ask again later.
    Pending,
    /// The source has no imagery for this tile.
    Absent,
}

/// A provider of tile images.
pub trait TileSource: Send + Sync + fmt::Debug {
    /// Produce the image for a tile covering `sector`, `tile_size` texels on
    /// each side. Row 0 of the image is the northern edge.
    fn fetch(&self, key: TileKey, sector: &Sector, tile_size: u32) -> TileFetch;
}

/// Procedural imagery: latitude-shaded background with a graticule.
#[derive(Debug, Clone)]
pub struct GraticuleTileSource {
    /// Degrees between grid lines.
    pub spacing: f64,
    pub background: Rgba<u8>,
    pub line: Rgba<u8>,
}

impl Default for GraticuleTileSource {
    fn default() -> Self {
        Self {
            spacing: 10.0,
            background: Rgba([28, 64, 112, 255]),
            line: Rgba([220, 220, 200, 255]),
        }
    }
}

impl TileSource for GraticuleTileSource {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fetch(&self, _key: TileKey, sector: &Sector, tile_size: u32) -> TileFetch {
        if tile_size == 0 || self.spacing <= 0.0 {
            return TileFetch::Absent;
        }
        let size = f64::from(tile_size);
        let texel_lat = sector.delta_latitude() / size;
        let texel_lon = sector.delta_longitude() / size;

        // Lines are one texel wide at every level: a texel starting at `low`
        // is a line when a multiple of the spacing falls inside it.
        let on_line = |low: f64, texel: f64| (low / self.spacing).ceil() * self.spacing < low + texel;

        let image = RgbaImage::from_fn(tile_size, tile_size, |x, y| {
            let latitude = sector.max_latitude - (f64::from(y) + 0.5) * texel_lat;
            let longitude = sector.min_longitude + (f64::from(x) + 0.5) * texel_lon;
            if on_line(latitude - 0.5 * texel_lat, texel_lat)
                || on_line(longitude - 0.5 * texel_lon, texel_lon)
            {
                return self.line;
            }
            // Darken toward the poles.
            let shade = 0.55 + 0.45 * latitude.to_radians().cos();
            let [r, g, b, a] = self.background.0;
            let scale = |c: u8| (f64::from(c) * shade).round() as u8;
            Rgba([scale(r), scale(g), scale(b), a])
        });
        TileFetch::Ready(Arc::new(image))
    }
}

/// Imagery cut from one global equirectangular image.
///
/// The image spans longitudes -180 to 180 left to right and latitudes 90
/// to -90 top to bottom. A source created with
/// [`ImageTileSource::pending`] reports [`TileFetch::Pending`] until an
/// image is supplied.
#[derive(Debug, Default)]
pub struct ImageTileSource {
    image: RwLock<Option<Arc<RgbaImage>>>,
}

impl ImageTileSource {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: RwLock::new(Some(Arc::new(image))),
        }
    }

    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// Supply the image once it has been loaded.
    pub fn set_image(&self, image: RgbaImage) {
        *self.image.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(image));
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl TileSource for ImageTileSource {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fetch(&self, _key: TileKey, sector: &Sector, tile_size: u32) -> TileFetch {
        let Some(image) = self
            .image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return TileFetch::Pending;
        };
        let (width, height) = (f64::from(image.width()), f64::from(image.height()));
        if width == 0.0 || height == 0.0 || tile_size == 0 {
            return TileFetch::Absent;
        }

        let x0 = ((sector.min_longitude + 180.0) / 360.0 * width).floor().max(0.0);
        let x1 = ((sector.max_longitude + 180.0) / 360.0 * width).ceil().min(width);
        let y0 = ((90.0 - sector.max_latitude) / 180.0 * height).floor().max(0.0);
        let y1 = ((90.0 - sector.min_latitude) / 180.0 * height).ceil().min(height);
        if x1 <= x0 || y1 <= y0 {
            return TileFetch::Absent;
        }

        let crop = imageops::crop_imm(
            &*image,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image();
        let tile = imageops::resize(&crop, tile_size, tile_size, FilterType::Triangle);
        TileFetch::Ready(Arc::new(tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graticule_draws_lines_on_multiples_of_spacing() {
        let source = GraticuleTileSource::default();
        // 20 degrees over 20 texels: one texel per degree.
        let sector = Sector::new(0.0, 20.0, 0.0, 20.0);
        let TileFetch::Ready(image) = source.fetch(TileKey::new(0, 0, 0), &sector, 20) else {
            panic!("graticule tiles are always ready");
        };
        // Column of longitude 10 (x = 10) and row of latitude 10 (y = 9,
        // counted from the north edge) are lines.
        assert_eq!(*image.get_pixel(10, 3), source.line);
        assert_eq!(*image.get_pixel(3, 9), source.line);
        assert_ne!(*image.get_pixel(3, 3), source.line);
    }

    #[test]
    fn test_image_source_is_pending_until_loaded() {
        let source = ImageTileSource::pending();
        let sector = Sector::new(0.0, 90.0, 0.0, 180.0);
        assert!(matches!(
            source.fetch(TileKey::new(0, 0, 0), &sector, 4),
            TileFetch::Pending
        ));

        // Left half red, right half blue.
        let image = RgbaImage::from_fn(8, 4, |x, _| {
            if x < 4 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        source.set_image(image);
        assert!(source.is_loaded());

        let TileFetch::Ready(tile) = source.fetch(TileKey::new(0, 0, 0), &sector, 4) else {
            panic!("loaded source must be ready");
        };
        assert_eq!(tile.dimensions(), (4, 4));
        assert_eq!(*tile.get_pixel(2, 1), Rgba([0, 0, 255, 255]));
    }
}
