use std::time::Duration;

/// Counters collected while rendering one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStatistics {
    pub terrain_tiles: usize,
    pub layers_rendered: usize,
    pub draw_calls: usize,
    pub triangles: usize,
    /// Surface tile draws, one per surface tile and terrain tile pair.
    pub surface_tile_draws: usize,
    /// Imagery tiles selected by tiled image layers.
    pub image_tiles: usize,
    /// Time spent building the frame's draw stream.
    pub frame_time: Duration,
}
