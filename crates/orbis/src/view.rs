//! The on-screen surface a navigator looks through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Size of the drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the viewport covers at least one pixel.
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A view owned by the window system.
///
/// The navigator only holds a weak handle to it. The viewport is unknown
/// until the first layout.
#[derive(Debug, Default)]
pub struct View {
    viewport: RwLock<Option<Viewport>>,
    redraw_requested: AtomicBool,
}

impl View {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_viewport(viewport: Viewport) -> Self {
        Self {
            viewport: RwLock::new(Some(viewport)),
            redraw_requested: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        *self.viewport.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the viewport after a layout pass.
    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        *self.viewport.write().unwrap_or_else(PoisonError::into_inner) = viewport;
        self.request_redraw();
    }

    pub fn request_redraw(&self) {
        self.redraw_requested.store(true, Ordering::Release);
    }

    /// Return whether a redraw was requested, clearing the request.
    pub fn take_redraw_request(&self) -> bool {
        self.redraw_requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redraw_request_is_consumed() {
        let view = View::new();
        assert!(!view.take_redraw_request());
        view.set_viewport(Some(Viewport::new(10, 20)));
        assert!(view.take_redraw_request());
        assert!(!view.take_redraw_request());
        assert_eq!(view.viewport(), Some(Viewport::new(10, 20)));
    }
}
