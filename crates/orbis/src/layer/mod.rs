//! Layers and the ordered list that composites them.
//!
//! A frame renders every enabled layer of the [`LayerList`] once, in list
//! order, so later layers paint over earlier ones.

mod renderable;
mod surface_image;
mod tile_source;
mod tiled_image;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::render::DrawContext;

pub use crate::tile::{LevelSet, TileKey};
pub use renderable::{Renderable, RenderableLayer};
pub use surface_image::SurfaceImage;
pub use tile_source::{GraticuleTileSource, ImageTileSource, TileFetch, TileSource};
pub use tiled_image::TiledImageLayer;

/// Name, visibility and opacity shared by all layers.
///
/// Fields use atomics so a UI thread can toggle a layer that the render
/// thread holds.
#[derive(Debug)]
pub struct LayerProperties {
    name: String,
    enabled: AtomicBool,
    opacity: AtomicU64,
}

impl LayerProperties {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            opacity: AtomicU64::new(1.0f64.to_bits()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn opacity(&self) -> f64 {
        f64::from_bits(self.opacity.load(Ordering::Relaxed))
    }

    /// Set the opacity applied to the layer's draws. Not clamped.
    pub fn set_opacity(&self, opacity: f64) {
        self.opacity.store(opacity.to_bits(), Ordering::Relaxed);
    }
}

/// A unit of rendering in the layer list.
pub trait Layer: Send + Sync {
    fn properties(&self) -> &LayerProperties;

    /// Draw into the frame.
    fn render(&self, dc: &mut DrawContext);

    fn name(&self) -> &str {
        self.properties().name()
    }

    fn is_enabled(&self) -> bool {
        self.properties().is_enabled()
    }
}

/// Ordered layers; index order is paint order.
#[derive(Clone, Default)]
pub struct LayerList {
    layers: Vec<Arc<dyn Layer>>,
}

impl fmt::Debug for LayerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.name()))
            .finish()
    }
}

impl LayerList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The layer at `index`.
    pub fn layer_at_index(&self, index: usize) -> Result<&Arc<dyn Layer>> {
        self.layers.get(index).ok_or(Error::OutOfRange {
            context: "layer_at_index",
            index,
            count: self.layers.len(),
        })
    }

    /// Append a layer, drawn after every layer already in the list.
    pub fn add_layer(&mut self, layer: Arc<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Insert a layer at `index`, shifting later layers back.
    ///
    /// `index` may equal [`LayerList::count`], which appends.
    pub fn insert_layer(&mut self, layer: Arc<dyn Layer>, index: usize) -> Result<()> {
        if index > self.layers.len() {
            return Err(Error::OutOfRange {
                context: "insert_layer",
                index,
                count: self.layers.len(),
            });
        }
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Remove and return the layer at `index`.
    pub fn remove_layer(&mut self, index: usize) -> Result<Arc<dyn Layer>> {
        if index >= self.layers.len() {
            return Err(Error::OutOfRange {
                context: "remove_layer",
                index,
                count: self.layers.len(),
            });
        }
        Ok(self.layers.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Layer>> {
        self.layers.iter()
    }
}

impl<'a> IntoIterator for &'a LayerList {
    type Item = &'a Arc<dyn Layer>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Layer>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedLayer(LayerProperties);

    impl Layer for NamedLayer {
        fn properties(&self) -> &LayerProperties {
            &self.0
        }

        fn render(&self, _dc: &mut DrawContext) {}
    }

    fn layer(name: &str) -> Arc<dyn Layer> {
        Arc::new(NamedLayer(LayerProperties::new(name)))
    }

    fn names(list: &LayerList) -> Vec<&str> {
        list.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut list = LayerList::new();
        assert!(list.is_empty());
        list.add_layer(layer("a"));
        list.add_layer(layer("b"));
        assert_eq!(list.count(), 2);
        assert_eq!(list.layer_at_index(1).unwrap().name(), "b");
    }

    #[test]
    fn test_insert_shifts_later_layers() {
        let mut list = LayerList::new();
        list.add_layer(layer("a"));
        list.add_layer(layer("c"));
        list.insert_layer(layer("b"), 1).unwrap();
        assert_eq!(names(&list), ["a", "b", "c"]);

        list.insert_layer(layer("d"), 3).unwrap();
        assert_eq!(names(&list), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_out_of_range_indices_are_errors() {
        let mut list = LayerList::new();
        list.add_layer(layer("a"));
        assert!(matches!(
            list.layer_at_index(1),
            Err(Error::OutOfRange {
                index: 1,
                count: 1,
                ..
            })
        ));
        assert!(list.insert_layer(layer("x"), 2).is_err());
        assert_eq!(list.count(), 1);
        assert!(list.remove_layer(1).is_err());
        assert_eq!(list.remove_layer(0).unwrap().name(), "a");
    }

    #[test]
    fn test_properties_toggle() {
        let properties = LayerProperties::new("p");
        assert!(properties.is_enabled());
        properties.set_enabled(false);
        assert!(!properties.is_enabled());
        properties.set_opacity(0.25);
        assert_eq!(properties.opacity(), 0.25);
    }
}
