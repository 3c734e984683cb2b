use std::sync::{Arc, PoisonError, RwLock};

use crate::layer::{Layer, LayerProperties};
use crate::render::DrawContext;

/// Something a [`RenderableLayer`] can draw.
pub trait Renderable: Send + Sync {
    fn render(&self, dc: &mut DrawContext);
}

/// A layer drawing a list of renderables in insertion order.
pub struct RenderableLayer {
    properties: LayerProperties,
    renderables: RwLock<Vec<Arc<dyn Renderable>>>,
}

impl RenderableLayer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            properties: LayerProperties::new(name),
            renderables: RwLock::new(Vec::new()),
        }
    }

    pub fn add_renderable(&self, renderable: Arc<dyn Renderable>) {
        self.renderables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(renderable);
    }

    pub fn clear(&self) {
        self.renderables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.renderables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Layer for RenderableLayer {
    fn properties(&self) -> &LayerProperties {
        &self.properties
    }

    fn render(&self, dc: &mut DrawContext) {
        // Snapshot so renderables can be added while the frame draws.
        let renderables = self
            .renderables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for renderable in &renderables {
            renderable.render(dc);
        }
    }
}
