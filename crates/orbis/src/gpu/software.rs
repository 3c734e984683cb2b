//! CPU replay of surface tile draws, for checking what a frame draws
//! without a GPU.
//!
//! Triangles are clipped against the near plane, interpolated with
//! perspective correction, depth tested with `<=` against a `[0, 1]` depth
//! buffer and blended as premultiplied "over". The color buffer stores
//! floats, so values outside `[0, 1]` survive until [`SoftwareRenderer::to_image`].

use glam::{Mat4, Vec2, Vec4, Vec4Swizzles};
use image::RgbaImage;

use crate::gpu::context::{DrawCommand, VertexAttribute};
use crate::gpu::program::Program;
use crate::gpu::surface_tile::{SurfaceTileParams, SurfaceTileProgram};
use crate::gpu::texture::Texture;

/// Interpolated values passed from the vertex to the fragment stage:
/// tile coordinate then texture coordinate.
type Varyings = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq)]
struct VertexOutput {
    position: Vec4,
    varyings: Varyings,
}

/// The surface tile stages bound to the state of one draw.
struct SurfaceTileStages<'a> {
    params: SurfaceTileParams,
    texture: Option<&'a Texture>,
    points: Option<&'a VertexAttribute>,
    tex_coords: Option<&'a VertexAttribute>,
}

impl<'a> SurfaceTileStages<'a> {
    fn bind(draw: &'a DrawCommand) -> Option<Self> {
        let program = SurfaceTileProgram::from_linked(draw.program.clone()).ok()?;
        let params = program.params(draw);
        Some(Self {
            texture: draw.texture(params.texture_unit).map(|t| &**t),
            points: draw.attribute(program.vertex_point_location()),
            tex_coords: draw.attribute(program.vertex_tex_coord_location()),
            params,
        })
    }

    fn vertex(&self, index: u32) -> VertexOutput {
        let fetch = |attribute: Option<&VertexAttribute>| attribute.map_or(Vec4::W, |a| a.fetch(index));
        let tex_coord = fetch(self.tex_coords);
        let transform = |m: Mat4| (m * tex_coord).xy();
        let tile = transform(self.params.tile_coord_matrix);
        let tex = transform(self.params.tex_coord_matrix);
        VertexOutput {
            position: self.params.mvp_matrix * fetch(self.points),
            varyings: [tile.x, tile.y, tex.x, tex.y],
        }
    }

    fn fragment(&self, varyings: &Varyings) -> [f32; 4] {
        let inside = |v: f32| (0.0..1.0).contains(&v);
        if !inside(varyings[0]) || !inside(varyings[1]) {
            return [0.0; 4];
        }
        // An unbound unit samples as opaque black.
        let texel = self
            .texture
            .map_or([0.0, 0.0, 0.0, 1.0], |t| t.sample(varyings[2], varyings[3]));
        texel.map(|c| c * self.params.opacity)
    }
}

/// Color and depth buffers with row 0 at the top.
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    position: Vec2,
    depth: f32,
    inv_w: f32,
    /// Varyings divided by w.
    varyings: Varyings,
}

impl SoftwareRenderer {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let mut renderer = Self {
            width: 0,
            height: 0,
            color: Vec::new(),
            depth: Vec::new(),
        };
        renderer.resize(width, height);
        renderer
    }

    /// Resize the buffers, clearing them.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        let len = width as usize * height as usize;
        self.color = vec![[0.0; 4]; len];
        self.depth = vec![1.0; len];
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the color buffer with a premultiplied color and reset depth.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.color.fill(color);
        self.depth.fill(1.0);
    }

    /// Replay draws in order. Draws made with other programs are skipped.
    pub fn execute(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            let Some(stages) = SurfaceTileStages::bind(command) else {
                continue;
            };
            for triangle in command.indices.chunks_exact(3) {
                let vertices = [
                    stages.vertex(triangle[0]),
                    stages.vertex(triangle[1]),
                    stages.vertex(triangle[2]),
                ];
                self.draw_triangle(command, &stages, vertices);
            }
        }
    }

    /// Premultiplied color of a pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.color[self.index(x, y)]
    }

    /// Depth of a pixel in `[0, 1]`.
    #[must_use]
    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[self.index(x, y)]
    }

    /// Convert the color buffer to a straight-alpha RGBA8 image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_image(&self) -> RgbaImage {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b, a] = self.pixel(x, y);
            let a = a.clamp(0.0, 1.0);
            let straight = |c: f32| if a > 0.0 { c / a } else { 0.0 };
            image::Rgba([
                to_byte(straight(r)),
                to_byte(straight(g)),
                to_byte(straight(b)),
                to_byte(a),
            ])
        })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn draw_triangle(
        &mut self,
        command: &DrawCommand,
        stages: &SurfaceTileStages<'_>,
        vertices: [VertexOutput; 3],
    ) {
        let polygon = clip_near(&vertices);
        if polygon.len() < 3 {
            return;
        }
        let screen: Vec<ScreenVertex> = match polygon
            .iter()
            .map(|v| self.to_screen(v))
            .collect::<Option<Vec<_>>>()
        {
            Some(screen) => screen,
            None => return,
        };
        for i in 1..screen.len() - 1 {
            self.fill(command, stages, [screen[0], screen[i], screen[i + 1]]);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_screen(&self, vertex: &VertexOutput) -> Option<ScreenVertex> {
        let w = vertex.position.w;
        if w <= f32::EPSILON {
            return None;
        }
        let inv_w = 1.0 / w;
        let ndc = vertex.position.truncate() * inv_w;
        Some(ScreenVertex {
            position: Vec2::new(
                (ndc.x * 0.5 + 0.5) * self.width as f32,
                (0.5 - ndc.y * 0.5) * self.height as f32,
            ),
            depth: ndc.z * 0.5 + 0.5,
            inv_w,
            varyings: vertex.varyings.map(|v| v * inv_w),
        })
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn fill(&mut self, command: &DrawCommand, stages: &SurfaceTileStages<'_>, mut tri: [ScreenVertex; 3]) {
        let mut area = edge(tri[0].position, tri[1].position, tri[2].position);
        if area == 0.0 || !area.is_finite() {
            return;
        }
        if area < 0.0 {
            tri.swap(1, 2);
            area = -area;
        }
        let [v0, v1, v2] = tri;

        let min = v0.position.min(v1.position).min(v2.position);
        let max = v0.position.max(v1.position).max(v2.position);
        let x_start = min.x.floor().max(0.0) as u32;
        let y_start = min.y.floor().max(0.0) as u32;
        let x_end = (max.x.ceil().max(0.0) as u32).min(self.width);
        let y_end = (max.y.ceil().max(0.0) as u32).min(self.height);

        let edges = [(v1, v2), (v2, v0), (v0, v1)];
        let state = command.state;

        for y in y_start..y_end {
            for x in x_start..x_end {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let mut weights = [0.0; 3];
                let mut covered = true;
                for (weight, (a, b)) in weights.iter_mut().zip(edges) {
                    *weight = edge(a.position, b.position, p);
                    if *weight < 0.0 || (*weight == 0.0 && !owns_edge(a.position, b.position)) {
                        covered = false;
                        break;
                    }
                }
                if !covered {
                    continue;
                }
                let [b0, b1, b2] = weights.map(|w| w / area);

                let depth = b0 * v0.depth + b1 * v1.depth + b2 * v2.depth;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                let index = self.index(x, y);
                if state.depth_test && depth > self.depth[index] {
                    continue;
                }

                let inv_w = b0 * v0.inv_w + b1 * v1.inv_w + b2 * v2.inv_w;
                let mut varyings = Varyings::default();
                for (i, v) in varyings.iter_mut().enumerate() {
                    *v = (b0 * v0.varyings[i] + b1 * v1.varyings[i] + b2 * v2.varyings[i]) / inv_w;
                }

                let src = stages.fragment(&varyings);
                let dst = &mut self.color[index];
                if state.blend {
                    let keep = 1.0 - src[3];
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d = s + *d * keep;
                    }
                } else {
                    *dst = src;
                }
                if state.depth_write {
                    self.depth[index] = depth;
                }
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)`.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Pixels exactly on an edge belong to one of the two triangles sharing it.
fn owns_edge(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    d.y > 0.0 || (d.y == 0.0 && d.x < 0.0)
}

/// Clip a triangle against `z >= -w`.
fn clip_near(vertices: &[VertexOutput; 3]) -> Vec<VertexOutput> {
    let distance = |v: &VertexOutput| v.position.z + v.position.w;
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let current = vertices[i];
        let next = vertices[(i + 1) % 3];
        let (dc, dn) = (distance(&current), distance(&next));
        if dc >= 0.0 {
            out.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push(lerp_vertex(&current, &next, t));
        }
    }
    out
}

fn lerp_vertex(a: &VertexOutput, b: &VertexOutput, t: f32) -> VertexOutput {
    let mut varyings = a.varyings;
    for (v, other) in varyings.iter_mut().zip(b.varyings) {
        *v += (other - *v) * t;
    }
    VertexOutput {
        position: Vec4::lerp(a.position, b.position, t),
        varyings,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{DMat4, DVec3};

    use super::*;
    use crate::gpu::context::{DrawState, GpuContext, TEXTURE0};

    struct Quad {
        color: [u8; 4],
        opacity: f64,
        tile_coord: DMat4,
        depth: f32,
    }

    impl Default for Quad {
        fn default() -> Self {
            Self {
                color: [255, 255, 255, 255],
                opacity: 1.0,
                tile_coord: DMat4::IDENTITY,
                depth: 0.0,
            }
        }
    }

    fn draw_quads(renderer: &mut SoftwareRenderer, quads: &[Quad]) {
        let program = SurfaceTileProgram::new().unwrap();
        let mut gpu = GpuContext::new();
        gpu.use_program(Some(program.program().clone()));
        program.load_modelview_projection(&mut gpu, &DMat4::IDENTITY);
        program.load_texture_matrix(&mut gpu, &DMat4::IDENTITY);
        program.load_texture_unit(&mut gpu, TEXTURE0).unwrap();

        for quad in quads {
            let z = quad.depth;
            gpu.active_texture(TEXTURE0).unwrap();
            gpu.bind_texture(Some(Arc::new(Texture::solid(quad.color))));
            program.load_opacity(&mut gpu, quad.opacity);
            program.load_tile_coord_matrix(&mut gpu, &quad.tile_coord);
            let points = VertexAttribute::new(
                program.vertex_point_location(),
                3,
                Arc::from(vec![-1.0, -1.0, z, 1.0, -1.0, z, 1.0, 1.0, z, -1.0, 1.0, z]),
            )
            .unwrap();
            let tex_coords = VertexAttribute::new(
                program.vertex_tex_coord_location(),
                2,
                Arc::from(vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
            )
            .unwrap();
            gpu.draw_elements(
                vec![points, tex_coords],
                Arc::from(vec![0, 1, 2, 0, 2, 3]),
                DrawState::default(),
            );
        }
        renderer.execute(&gpu.take_commands());
    }

    fn assert_alpha_everywhere(renderer: &SoftwareRenderer, expected: f32) {
        for y in 0..renderer.height() {
            for x in 0..renderer.width() {
                let alpha = renderer.pixel(x, y)[3];
                assert!(
                    (alpha - expected).abs() < 1e-5,
                    "pixel ({x}, {y}) has alpha {alpha}"
                );
            }
        }
    }

    #[test]
    fn test_quad_covers_every_pixel_once() {
        // The shared diagonal passes through pixel centers; double coverage
        // would show up as alpha 0.75.
        let mut renderer = SoftwareRenderer::new(4, 4);
        draw_quads(
            &mut renderer,
            &[Quad {
                opacity: 0.5,
                ..Quad::default()
            }],
        );
        assert_alpha_everywhere(&renderer, 0.5);
    }

    #[test]
    fn test_zero_opacity_leaves_pixels_transparent() {
        let mut renderer = SoftwareRenderer::new(4, 4);
        draw_quads(
            &mut renderer,
            &[Quad {
                opacity: 0.0,
                ..Quad::default()
            }],
        );
        assert_alpha_everywhere(&renderer, 0.0);
    }

    #[test]
    fn test_opacity_above_one_is_not_clamped() {
        let mut renderer = SoftwareRenderer::new(4, 4);
        draw_quads(
            &mut renderer,
            &[Quad {
                opacity: 2.0,
                ..Quad::default()
            }],
        );
        assert_alpha_everywhere(&renderer, 2.0);
        assert_eq!(renderer.to_image().get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_tile_mask_clips_outside_fragments() {
        // Tile coordinates run 0..2 across the quad, so only the left half
        // falls inside the tile.
        let mut renderer = SoftwareRenderer::new(4, 4);
        draw_quads(
            &mut renderer,
            &[Quad {
                tile_coord: DMat4::from_scale(DVec3::new(2.0, 1.0, 1.0)),
                ..Quad::default()
            }],
        );
        for y in 0..4 {
            assert_eq!(renderer.pixel(0, y)[3], 1.0);
            assert_eq!(renderer.pixel(1, y)[3], 1.0);
            assert_eq!(renderer.pixel(2, y), [0.0; 4]);
            assert_eq!(renderer.pixel(3, y), [0.0; 4]);
        }
    }

    #[test]
    fn test_later_draw_at_equal_depth_paints_over() {
        let mut renderer = SoftwareRenderer::new(2, 2);
        draw_quads(
            &mut renderer,
            &[
                Quad {
                    color: [255, 0, 0, 255],
                    ..Quad::default()
                },
                Quad {
                    color: [0, 0, 255, 255],
                    ..Quad::default()
                },
            ],
        );
        assert_eq!(renderer.pixel(1, 1), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_depth_test_rejects_farther_draw() {
        let mut renderer = SoftwareRenderer::new(2, 2);
        draw_quads(
            &mut renderer,
            &[
                Quad {
                    color: [255, 0, 0, 255],
                    depth: -0.5,
                    ..Quad::default()
                },
                Quad {
                    color: [0, 0, 255, 255],
                    depth: 0.5,
                    ..Quad::default()
                },
            ],
        );
        assert_eq!(renderer.pixel(0, 0), [1.0, 0.0, 0.0, 1.0]);
        assert!((renderer.depth(0, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_geometry_behind_near_plane_is_clipped() {
        let mut renderer = SoftwareRenderer::new(2, 2);
        draw_quads(
            &mut renderer,
            &[Quad {
                depth: -1.5,
                ..Quad::default()
            }],
        );
        assert_alpha_everywhere(&renderer, 0.0);
    }

    #[test]
    fn test_to_image_unpremultiplies() {
        let mut renderer = SoftwareRenderer::new(1, 1);
        renderer.clear([0.25, 0.0, 0.0, 0.5]);
        assert_eq!(renderer.to_image().get_pixel(0, 0).0, [128, 0, 0, 128]);
    }
}
