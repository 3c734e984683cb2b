//! Texture storage.

use image::RgbaImage;

/// An RGBA8 texture with premultiplied alpha.
#[derive(Debug, Clone)]
pub struct Texture {
    image: RgbaImage,
}

impl Texture {
    /// Create a texture from a straight-alpha image, premultiplying it.
    #[must_use]
    pub fn from_image(mut image: RgbaImage) -> Self {
        for pixel in image.pixels_mut() {
            let a = u16::from(pixel[3]);
            for c in &mut pixel.0[..3] {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
        Self { image }
    }

    /// Create a 1x1 texture of a single straight-alpha color.
    #[must_use]
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::from_image(RgbaImage::from_pixel(1, 1, image::Rgba(rgba)))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Premultiplied texels, first row first.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Bytes of texel storage.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Bilinear sample with clamp-to-edge addressing.
    ///
    /// `t = 0` addresses the first image row. Returns premultiplied RGBA in
    /// `[0, 1]`.
    #[cfg(test)]
    pub(crate) fn sample(&self, s: f32, t: f32) -> [f32; 4] {
        let (w, h) = (self.image.width(), self.image.height());
        if w == 0 || h == 0 {
            return [0.0; 4];
        }

        let x = s * w as f32 - 0.5;
        let y = t * h as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let clamp_x = |v: f32| v.clamp(0.0, (w - 1) as f32) as u32;
        let clamp_y = |v: f32| v.clamp(0.0, (h - 1) as f32) as u32;
        let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
        let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));

        let texel = |x: u32, y: u32| self.image.get_pixel(x, y).0;
        let (p00, p10, p01, p11) = (texel(xa, ya), texel(xb, ya), texel(xa, yb), texel(xb, yb));

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let mut out = [0.0; 4];
        for (i, o) in out.iter_mut().enumerate() {
            let top = lerp(f32::from(p00[i]), f32::from(p10[i]), fx);
            let bottom = lerp(f32::from(p01[i]), f32::from(p11[i]), fx);
            *o = lerp(top, bottom, fy) / 255.0;
        }
        out
    }
}
