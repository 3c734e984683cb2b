use std::sync::Arc;

use orbis_geom::Globe;
use web_time::Instant;

use crate::gpu::{DrawCommand, GpuResourceCache};
use crate::layer::LayerList;
use crate::navigate::NavigatorState;
use crate::render::{DrawContext, FrameStatistics};
use crate::terrain::{Tessellator, TessellatorConfig};

/// Scene-wide rendering settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Premultiplied color the frame is cleared to.
    pub clear_color: [f32; 4],
    pub vertical_exaggeration: f64,
    pub tessellator: TessellatorConfig,
    /// GPU resource cache capacity in bytes.
    pub resource_capacity: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vertical_exaggeration: 1.0,
            tessellator: TessellatorConfig::default(),
            resource_capacity: 256 * 1024 * 1024,
        }
    }
}

/// The draws recorded for one frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub commands: Vec<DrawCommand>,
    pub statistics: FrameStatistics,
}

/// Drives a frame: tessellates terrain, then renders each enabled layer.
#[derive(Debug)]
pub struct SceneController {
    dc: DrawContext,
    tessellator: Tessellator,
    config: SceneConfig,
}

impl SceneController {
    #[must_use]
    pub fn new(globe: Arc<Globe>, config: SceneConfig) -> Self {
        let mut dc = DrawContext::new(globe, GpuResourceCache::new(config.resource_capacity));
        dc.set_vertical_exaggeration(config.vertical_exaggeration);
        Self {
            dc,
            tessellator: Tessellator::new(config.tessellator.clone()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn set_vertical_exaggeration(&mut self, exaggeration: f64) {
        self.config.vertical_exaggeration = exaggeration;
        self.dc.set_vertical_exaggeration(exaggeration);
    }

    #[must_use]
    pub fn draw_context(&self) -> &DrawContext {
        &self.dc
    }

    pub fn draw_context_mut(&mut self) -> &mut DrawContext {
        &mut self.dc
    }

    /// Record the draws for one frame seen from `state`.
    pub fn render_frame(&mut self, state: Arc<NavigatorState>, layers: Arc<LayerList>) -> Frame {
        let started = Instant::now();
        let dc = &mut self.dc;
        dc.reset();
        dc.set_layers(layers.clone());
        dc.set_navigator_state(state.clone());

        let exaggeration = dc.vertical_exaggeration();
        let terrain = self.tessellator.tessellate(dc.globe(), &state, exaggeration);
        dc.statistics_mut().terrain_tiles = terrain.len();
        dc.set_surface_geometry(Some(Arc::new(terrain)));

        for layer in layers.iter() {
            if !layer.is_enabled() {
                continue;
            }
            dc.set_layer_opacity(layer.properties().opacity());
            layer.render(dc);
            dc.statistics_mut().layers_rendered += 1;
        }
        dc.bind_program(None);

        let commands = dc.gpu_mut().take_commands();
        let statistics = dc.statistics_mut();
        statistics.draw_calls = commands.len();
        statistics.triangles = commands.iter().map(DrawCommand::triangle_count).sum();
        statistics.frame_time = started.elapsed();
        let statistics = *statistics;

        tracing::debug!(
            terrain_tiles = statistics.terrain_tiles,
            layers = statistics.layers_rendered,
            draw_calls = statistics.draw_calls,
            frame_time = ?statistics.frame_time,
            "rendered frame"
        );

        Frame {
            commands,
            statistics,
        }
    }
}
