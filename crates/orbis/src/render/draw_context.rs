use std::sync::Arc;

use orbis_geom::{Globe, Sector};
use web_time::Instant;

use crate::error::Result;
use crate::gpu::{GpuContext, GpuProgram, GpuResourceCache, Program, SurfaceTileRenderer};
use crate::layer::LayerList;
use crate::navigate::NavigatorState;
use crate::render::FrameStatistics;
use crate::terrain::TerrainTileList;

/// Per-frame state shared by everything drawn in a frame.
///
/// The scene controller owns one draw context and [`reset`](Self::reset)s
/// it at the start of every frame. Between resets it carries the navigator
/// snapshot, the tessellated terrain, the layer being drawn and the GPU
/// state layers draw through.
#[derive(Debug)]
pub struct DrawContext {
    timestamp: Instant,
    globe: Arc<Globe>,
    layers: Arc<LayerList>,
    navigator_state: Arc<NavigatorState>,
    surface_geometry: Option<Arc<TerrainTileList>>,
    visible_sector: Option<Sector>,
    vertical_exaggeration: f64,
    layer_opacity: f64,
    gpu: GpuContext,
    resources: GpuResourceCache,
    surface_tile_renderer: SurfaceTileRenderer,
    statistics: FrameStatistics,
}

impl DrawContext {
    #[must_use]
    pub fn new(globe: Arc<Globe>, resources: GpuResourceCache) -> Self {
        Self {
            timestamp: Instant::now(),
            globe,
            layers: Arc::default(),
            navigator_state: Arc::default(),
            surface_geometry: None,
            visible_sector: None,
            vertical_exaggeration: 1.0,
            layer_opacity: 1.0,
            gpu: GpuContext::new(),
            resources,
            surface_tile_renderer: SurfaceTileRenderer::default(),
            statistics: FrameStatistics::default(),
        }
    }

    /// Prepare for a new frame.
    ///
    /// Clears everything that belongs to the previous frame: the bound
    /// program, the terrain, the visible sector, the recorded draws and the
    /// statistics. The globe, the resource cache and the vertical
    /// exaggeration survive.
    pub fn reset(&mut self) {
        self.timestamp = Instant::now();
        self.surface_geometry = None;
        self.visible_sector = None;
        self.layer_opacity = 1.0;
        self.gpu.reset();
        self.statistics = FrameStatistics::default();
    }

    /// Time the current frame started.
    #[must_use]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[must_use]
    pub fn globe(&self) -> &Arc<Globe> {
        &self.globe
    }

    #[must_use]
    pub fn layers(&self) -> &Arc<LayerList> {
        &self.layers
    }

    #[must_use]
    pub fn navigator_state(&self) -> &Arc<NavigatorState> {
        &self.navigator_state
    }

    /// Terrain tessellated for this frame, if any.
    #[must_use]
    pub fn surface_geometry(&self) -> Option<&Arc<TerrainTileList>> {
        self.surface_geometry.as_ref()
    }

    /// Union of the terrain tile sectors drawn this frame.
    #[must_use]
    pub fn visible_sector(&self) -> Option<Sector> {
        self.visible_sector
    }

    #[must_use]
    pub fn vertical_exaggeration(&self) -> f64 {
        self.vertical_exaggeration
    }

    /// Opacity of the layer currently being rendered.
    #[must_use]
    pub fn layer_opacity(&self) -> f64 {
        self.layer_opacity
    }

    #[must_use]
    pub fn current_program(&self) -> Option<&Arc<GpuProgram>> {
        self.gpu.current_program()
    }

    #[must_use]
    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut GpuContext {
        &mut self.gpu
    }

    #[must_use]
    pub fn resources(&self) -> &GpuResourceCache {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut GpuResourceCache {
        &mut self.resources
    }

    #[must_use]
    pub fn surface_tile_renderer(&self) -> &SurfaceTileRenderer {
        &self.surface_tile_renderer
    }

    #[must_use]
    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut FrameStatistics {
        &mut self.statistics
    }

    /// Make `program` current, or unbind with `None`.
    pub fn bind_program(&mut self, program: Option<Arc<GpuProgram>>) {
        self.gpu.use_program(program);
    }

    /// Find the program `P` in the resource cache, building it on a miss,
    /// and make it current.
    ///
    /// On failure no program is left bound, so draws issued by a layer that
    /// ignores the error are dropped.
    pub fn find_and_bind_program<P: Program>(&mut self) -> Result<P> {
        let found = self
            .resources
            .find_or_create_program(P::KEY, P::create)
            .and_then(|linked| Ok((P::from_linked(linked.clone())?, linked)));
        match found {
            Ok((program, linked)) => {
                self.gpu.use_program(Some(linked));
                Ok(program)
            }
            Err(e) => {
                self.gpu.use_program(None);
                Err(e)
            }
        }
    }

    pub(crate) fn set_layers(&mut self, layers: Arc<LayerList>) {
        self.layers = layers;
    }

    pub(crate) fn set_navigator_state(&mut self, state: Arc<NavigatorState>) {
        self.navigator_state = state;
    }

    pub(crate) fn set_surface_geometry(&mut self, geometry: Option<Arc<TerrainTileList>>) {
        self.visible_sector = geometry.as_ref().and_then(|g| g.sector());
        self.surface_geometry = geometry;
    }

    pub(crate) fn set_vertical_exaggeration(&mut self, exaggeration: f64) {
        self.vertical_exaggeration = exaggeration;
    }

    pub(crate) fn set_layer_opacity(&mut self, opacity: f64) {
        self.layer_opacity = opacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SurfaceTileProgram;
    use crate::terrain::Tessellator;

    fn context() -> DrawContext {
        DrawContext::new(Arc::new(Globe::wgs84()), GpuResourceCache::default())
    }

    #[test]
    fn test_reset_clears_frame_state() {
        let mut dc = context();
        let state = Arc::new(NavigatorState::default());
        dc.set_navigator_state(state.clone());
        let terrain = Tessellator::default().tessellate(dc.globe(), &state, 1.0);
        dc.set_surface_geometry(Some(Arc::new(terrain)));
        dc.set_layer_opacity(0.3);
        dc.find_and_bind_program::<SurfaceTileProgram>().unwrap();
        dc.statistics_mut().draw_calls = 4;
        let before = dc.timestamp();

        dc.reset();

        assert!(dc.surface_geometry().is_none());
        assert!(dc.visible_sector().is_none());
        assert!(dc.current_program().is_none());
        assert_eq!(dc.layer_opacity(), 1.0);
        assert_eq!(dc.statistics().draw_calls, 0);
        assert!(dc.timestamp() >= before);
        // Programs stay cached across frames.
        assert!(
            dc.resources()
                .contains(&crate::gpu::ResourceKey::program(SurfaceTileProgram::KEY))
        );
    }

    #[test]
    fn test_find_and_bind_program_reuses_cached_program() {
        let mut dc = context();
        let first = dc.find_and_bind_program::<SurfaceTileProgram>().unwrap();
        let second = dc.find_and_bind_program::<SurfaceTileProgram>().unwrap();
        assert!(Arc::ptr_eq(first.program(), second.program()));
        assert!(Arc::ptr_eq(dc.current_program().unwrap(), first.program()));
        assert_eq!(dc.resources().len(), 1);

        dc.bind_program(None);
        assert!(dc.current_program().is_none());
    }

    struct BrokenProgram;

    impl Program for BrokenProgram {
        const KEY: crate::gpu::ProgramKey = "test.broken_program";
        const VERTEX_SOURCE: &'static str = "";
        const FRAGMENT_SOURCE: &'static str = "";

        fn create() -> Result<GpuProgram> {
            Err(crate::Error::ProgramLink {
                key: Self::KEY,
                message: "missing entry point".into(),
            })
        }

        fn from_linked(_program: Arc<GpuProgram>) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_failed_program_is_not_cached_or_bound() {
        let mut dc = context();
        assert!(matches!(
            dc.find_and_bind_program::<BrokenProgram>(),
            Err(crate::Error::ProgramLink { .. })
        ));
        assert!(matches!(
            dc.find_and_bind_program::<BrokenProgram>(),
            Err(crate::Error::ProgramUnavailable { .. })
        ));
        assert!(dc.current_program().is_none());
        assert!(dc.resources().is_empty());
    }
}
