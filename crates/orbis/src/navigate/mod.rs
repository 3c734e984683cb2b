//! Camera navigation around the globe.
//!
//! The [`Navigator`] owns the camera parameters: the look-at location, the
//! range from it, the heading and the tilt. Input arrives as recognized
//! gestures from any thread; the render thread asks for a
//! [`NavigatorState`] once per frame. All parameters, gesture baselines and
//! the running animation live under one lock so a snapshot never sees a
//! half-applied update.

mod animation;
mod gesture;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use orbis_geom::angle::normalize_heading;
use orbis_geom::{Globe, Location};

use crate::error::{Error, Result};
use crate::view::{View, Viewport};

pub use gesture::GesturePhase;
pub use state::NavigatorState;

use animation::Animation;
use gesture::GestureBaselines;

/// Navigator limits and initial camera.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorConfig {
    /// Smallest range in meters.
    pub min_range: f64,
    /// Largest range in meters; larger requests are clamped.
    pub max_range: f64,
    /// Near clip distance used before the view has a viewport.
    pub default_near: f64,
    /// Far clip distance used before the view has a viewport.
    pub default_far: f64,
    /// Depth resolution in meters required at the far plane.
    pub far_resolution: f64,
    /// Depth buffer precision.
    pub depth_bits: u32,
    /// Camera at creation.
    pub initial_camera: Camera,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            min_range: 1.0,
            max_range: 5.0e7,
            default_near: 1.0,
            default_far: 1.0e9,
            far_resolution: 10.0,
            depth_bits: 24,
            initial_camera: Camera::default(),
        }
    }
}

/// Camera parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub look_at: Location,
    /// Distance from the look-at location in meters.
    pub range: f64,
    /// Degrees clockwise from north, in `[0, 360)`.
    pub heading: f64,
    /// Degrees away from looking straight down, in `[0, 90]`.
    pub tilt: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            look_at: Location::ZERO,
            range: 1.0e7,
            heading: 0.0,
            tilt: 0.0,
        }
    }
}

#[derive(Debug)]
struct NavigatorInner {
    camera: Camera,
    gestures: GestureBaselines,
    animation: Option<Animation>,
}

/// Camera controller for a view.
#[derive(Debug)]
pub struct Navigator {
    view: Weak<View>,
    globe: Arc<Globe>,
    config: NavigatorConfig,
    inner: Mutex<NavigatorInner>,
}

impl Navigator {
    /// Create a navigator for a live view.
    ///
    /// Fails when `view` no longer points to a view. The initial camera is
    /// validated like any other [`Navigator::set_camera`] call.
    pub fn new(view: Weak<View>, globe: Arc<Globe>, config: NavigatorConfig) -> Result<Self> {
        if view.strong_count() == 0 {
            return Err(Error::invalid("navigator", "view is absent"));
        }
        if !(config.min_range > 0.0 && config.min_range <= config.max_range) {
            return Err(Error::invalid(
                "navigator",
                format!(
                    "range limits [{}, {}] are not a positive interval",
                    config.min_range, config.max_range
                ),
            ));
        }
        let camera = validate_camera(&config, config.initial_camera)?;

        Ok(Self {
            view,
            globe,
            config,
            inner: Mutex::new(NavigatorInner {
                camera,
                gestures: GestureBaselines::default(),
                animation: None,
            }),
        })
    }

    #[must_use]
    pub fn globe(&self) -> &Arc<Globe> {
        &self.globe
    }

    #[must_use]
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// The view, if it is still alive.
    #[must_use]
    pub fn view(&self) -> Option<Arc<View>> {
        self.view.upgrade()
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.lock().camera
    }

    #[must_use]
    pub fn look_at(&self) -> Location {
        self.lock().camera.look_at
    }

    #[must_use]
    pub fn range(&self) -> f64 {
        self.lock().camera.range
    }

    #[must_use]
    pub fn heading(&self) -> f64 {
        self.lock().camera.heading
    }

    #[must_use]
    pub fn tilt(&self) -> f64 {
        self.lock().camera.tilt
    }

    pub fn set_look_at(&self, look_at: Location) -> Result<()> {
        let look_at = validate_look_at(look_at)?;
        self.lock().camera.look_at = look_at;
        self.request_redraw();
        Ok(())
    }

    /// Set the range. Non-positive or non-finite ranges are rejected;
    /// ranges outside the configured limits are clamped.
    pub fn set_range(&self, range: f64) -> Result<()> {
        let range = validate_range(&self.config, range)?;
        self.lock().camera.range = range;
        self.request_redraw();
        Ok(())
    }

    /// Set the heading, normalized into `[0, 360)`.
    pub fn set_heading(&self, heading: f64) -> Result<()> {
        let heading = validate_heading(heading)?;
        self.lock().camera.heading = heading;
        self.request_redraw();
        Ok(())
    }

    /// Set the tilt, clamped into `[0, 90]`.
    pub fn set_tilt(&self, tilt: f64) -> Result<()> {
        let tilt = validate_tilt(tilt)?;
        self.lock().camera.tilt = tilt;
        self.request_redraw();
        Ok(())
    }

    /// Set all parameters at once. Nothing changes if any of them is invalid.
    pub fn set_camera(&self, camera: Camera) -> Result<()> {
        let camera = validate_camera(&self.config, camera)?;
        self.lock().camera = camera;
        self.request_redraw();
        Ok(())
    }

    /// Compute the camera state for the current frame.
    #[must_use]
    pub fn current_state(&self) -> Arc<NavigatorState> {
        let camera = self.camera();
        let viewport = self.viewport();
        Arc::new(NavigatorState::compute(
            &self.globe,
            camera,
            viewport,
            &self.config,
        ))
    }

    fn viewport(&self) -> Option<Viewport> {
        self.view.upgrade().and_then(|view| view.viewport())
    }

    fn request_redraw(&self) {
        if let Some(view) = self.view.upgrade() {
            view.request_redraw();
        }
    }

    fn lock(&self) -> MutexGuard<'_, NavigatorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clamp_range(&self, range: f64) -> f64 {
        range.clamp(self.config.min_range, self.config.max_range)
    }
}

fn validate_look_at(look_at: Location) -> Result<Location> {
    Location::checked(look_at.latitude, look_at.longitude)
        .map(Location::normalized)
        .map_err(Error::from)
}

fn validate_range(config: &NavigatorConfig, range: f64) -> Result<f64> {
    if !range.is_finite() || range <= 0.0 {
        return Err(Error::invalid(
            "range",
            format!("{range} is not a positive distance"),
        ));
    }
    Ok(range.clamp(config.min_range, config.max_range))
}

fn validate_heading(heading: f64) -> Result<f64> {
    if !heading.is_finite() {
        return Err(Error::invalid("heading", format!("{heading} is not finite")));
    }
    Ok(normalize_heading(heading))
}

fn validate_tilt(tilt: f64) -> Result<f64> {
    if !tilt.is_finite() {
        return Err(Error::invalid("tilt", format!("{tilt} is not finite")));
    }
    Ok(tilt.clamp(0.0, 90.0))
}

fn validate_camera(config: &NavigatorConfig, camera: Camera) -> Result<Camera> {
    Ok(Camera {
        look_at: validate_look_at(camera.look_at)?,
        range: validate_range(config, camera.range)?,
        heading: validate_heading(camera.heading)?,
        tilt: validate_tilt(camera.tilt)?,
    })
}
