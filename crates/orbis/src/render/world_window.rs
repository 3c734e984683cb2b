use std::sync::Arc;

use orbis_geom::Globe;
use web_time::Instant;

use crate::error::Result;
use crate::layer::LayerList;
use crate::navigate::{Navigator, NavigatorConfig};
use crate::render::{Frame, FrameStatistics, SceneConfig, SceneController};
use crate::view::{View, Viewport};

/// Settings for a [`WorldWindow`].
#[derive(Debug, Clone, Default)]
pub struct WorldWindowConfig {
    pub globe: Globe,
    pub navigator: NavigatorConfig,
    pub scene: SceneConfig,
}

/// A globe view: a viewport, a navigator and a layer list.
///
/// [`render`](WorldWindow::render) records a frame's draw stream; replaying
/// it is up to the backend that owns the surface.
#[derive(Debug)]
pub struct WorldWindow {
    view: Arc<View>,
    navigator: Arc<Navigator>,
    scene: SceneController,
    layers: Arc<LayerList>,
    statistics: FrameStatistics,
}

impl WorldWindow {
    pub fn new(viewport: Viewport, config: WorldWindowConfig) -> Result<Self> {
        let view = Arc::new(View::with_viewport(viewport));
        let globe = Arc::new(config.globe);
        let navigator = Navigator::new(Arc::downgrade(&view), globe.clone(), config.navigator)?;
        tracing::info!(
            width = viewport.width,
            height = viewport.height,
            "created world window"
        );
        Ok(Self {
            view,
            navigator: Arc::new(navigator),
            scene: SceneController::new(globe, config.scene),
            layers: Arc::default(),
            statistics: FrameStatistics::default(),
        })
    }

    #[must_use]
    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    #[must_use]
    pub fn layers(&self) -> &LayerList {
        &self.layers
    }

    /// Mutable access to the layer list; changes apply from the next frame.
    pub fn layers_mut(&mut self) -> &mut LayerList {
        Arc::make_mut(&mut self.layers)
    }

    #[must_use]
    pub fn scene(&self) -> &SceneController {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneController {
        &mut self.scene
    }

    /// Statistics of the last rendered frame.
    #[must_use]
    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    /// Change the viewport, requesting a redraw.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.view.set_viewport(Some(Viewport::new(width, height)));
    }

    /// Whether the next call to [`render`](Self::render) would show
    /// something new.
    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.navigator.is_animating() || self.view.take_redraw_request()
    }

    /// Advance animations and record a frame.
    pub fn render(&mut self) -> Frame {
        self.navigator.update(Instant::now());
        let state = self.navigator.current_state();
        let frame = self.scene.render_frame(state, self.layers.clone());
        self.statistics = frame.statistics;
        frame
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use orbis_geom::{Location, Sector};

    use super::*;
    use crate::gpu::software::SoftwareRenderer;
    use crate::layer::{Layer, RenderableLayer, SurfaceImage};
    use crate::navigate::Camera;

    fn window() -> WorldWindow {
        let config = WorldWindowConfig {
            navigator: NavigatorConfig {
                initial_camera: Camera {
                    look_at: Location::new(0.0, 0.0),
                    range: 1.0e6,
                    ..Camera::default()
                },
                ..NavigatorConfig::default()
            },
            ..WorldWindowConfig::default()
        };
        WorldWindow::new(Viewport::new(64, 64), config).unwrap()
    }

    /// Record a frame and replay it on the CPU.
    fn draw(window: &mut WorldWindow) -> SoftwareRenderer {
        let viewport = window.view().viewport().unwrap();
        let frame = window.render();
        let mut renderer = SoftwareRenderer::new(viewport.width, viewport.height);
        renderer.clear(window.scene().config().clear_color);
        renderer.execute(&frame.commands);
        renderer
    }

    fn image_layer(name: &str, color: [u8; 4]) -> Arc<RenderableLayer> {
        let layer = RenderableLayer::new(name);
        layer.add_renderable(Arc::new(SurfaceImage::new(
            Sector::new(-30.0, 30.0, -30.0, 30.0),
            RgbaImage::from_pixel(2, 2, Rgba(color)),
        )));
        Arc::new(layer)
    }

    #[test]
    fn test_empty_scene_shows_clear_color() {
        let mut window = window();
        let renderer = draw(&mut window);
        assert_eq!(renderer.pixel(32, 32), [0.0, 0.0, 0.0, 1.0]);
        assert!(window.statistics().terrain_tiles > 0);
        assert_eq!(window.statistics().draw_calls, 0);
    }

    #[test]
    fn test_later_layers_paint_over_earlier_ones() {
        let mut window = window();
        window.layers_mut().add_layer(image_layer("red", [255, 0, 0, 255]));
        window.layers_mut().add_layer(image_layer("blue", [0, 0, 255, 255]));

        let renderer = draw(&mut window);
        assert_eq!(renderer.pixel(32, 32), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(window.statistics().layers_rendered, 2);
        assert!(window.statistics().surface_tile_draws >= 2);
    }

    #[test]
    fn test_disabled_layer_is_skipped() {
        let mut window = window();
        let blue = image_layer("blue", [0, 0, 255, 255]);
        window.layers_mut().add_layer(image_layer("red", [255, 0, 0, 255]));
        window.layers_mut().add_layer(blue.clone());
        blue.properties().set_enabled(false);

        let renderer = draw(&mut window);
        assert_eq!(renderer.pixel(32, 32), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(window.statistics().layers_rendered, 1);
    }

    #[test]
    fn test_layer_opacity_blends() {
        let mut window = window();
        let white = image_layer("white", [255, 255, 255, 255]);
        white.properties().set_opacity(0.5);
        window.layers_mut().add_layer(white);

        let [r, g, b, a] = draw(&mut window).pixel(32, 32);
        for channel in [r, g, b] {
            assert!((channel - 0.5).abs() < 1e-6);
        }
        assert!((a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_resize_requests_redraw() {
        let mut window = window();
        window.render();
        assert!(window.needs_redraw());
        assert!(!window.needs_redraw());

        window.resize(32, 16);
        assert!(window.needs_redraw());
        let image = draw(&mut window).to_image();
        assert_eq!(image.dimensions(), (32, 16));
        assert_eq!(image.get_pixel(16, 8).0, [0, 0, 0, 255]);
    }
}
