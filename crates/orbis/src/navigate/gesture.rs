//! Camera updates from recognized gestures.
//!
//! Recognizers report cumulative values since the gesture began. On
//! [`GesturePhase::Began`] the navigator caches the parameter the gesture
//! drives and cancels any animation; each [`GesturePhase::Changed`] then
//! recomputes the parameter from that baseline. Pan, pinch and rotation keep
//! separate baselines so they can run at the same time.

use glam::DVec2;
use orbis_geom::angle::{clamp_latitude, normalize_heading, normalize_longitude};
use orbis_geom::matrix::perspective_pixel_size;
use orbis_geom::Location;

use crate::navigate::{Navigator, NavigatorInner};

/// Fraction of a wheel delta, in pixels, applied as pixels of zoom.
const WHEEL_ZOOM_FACTOR: f64 = 0.5;

/// State of a recognized gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
}

#[derive(Debug, Default)]
pub(super) struct GestureBaselines {
    last_pan: DVec2,
    pinch_range: f64,
    rotation_heading: f64,
    vertical_pan_tilt: f64,
    drag_heading: f64,
    drag_tilt: f64,
}

impl Navigator {
    /// One-finger pan: move the look-at location with the finger.
    ///
    /// `translation` is in screen pixels (y down) since the gesture began.
    pub fn handle_pan(&self, phase: GesturePhase, translation: DVec2) {
        let Some(viewport) = self.viewport() else {
            return;
        };
        let radius = self.globe.equatorial_radius();

        let changed = {
            let mut inner = self.lock();
            match phase {
                GesturePhase::Began => {
                    inner.animation = None;
                    inner.gestures.last_pan = translation;
                    false
                }
                GesturePhase::Changed => {
                    // Pan is incremental, so the baseline follows the finger
                    // even while an animation drops the movement.
                    let delta = translation - inner.gestures.last_pan;
                    inner.gestures.last_pan = translation;
                    if inner.animation.is_some() {
                        false
                    } else {
                        let camera = &mut inner.camera;
                        let meters_per_pixel = perspective_pixel_size(
                            f64::from(viewport.height),
                            camera.range.max(1.0),
                        );
                        let forward = delta.y * meters_per_pixel;
                        let side = -delta.x * meters_per_pixel;
                        let (sin_h, cos_h) = camera.heading.to_radians().sin_cos();
                        let north = forward * cos_h - side * sin_h;
                        let east = forward * sin_h + side * cos_h;

                        let latitude = camera.look_at.latitude;
                        let east_scale = latitude.to_radians().cos().max(0.01);
                        camera.look_at = Location::new(
                            clamp_latitude(latitude + (north / radius).to_degrees()),
                            normalize_longitude(
                                camera.look_at.longitude
                                    + (east / (radius * east_scale)).to_degrees(),
                            ),
                        );
                        true
                    }
                }
                GesturePhase::Ended | GesturePhase::Cancelled => false,
            }
        };
        if changed {
            self.request_redraw();
        }
    }

    /// Two-finger pinch: divide the range by the cumulative scale.
    pub fn handle_pinch(&self, phase: GesturePhase, scale: f64) {
        let changed = self.update_gesture(phase, |inner| match phase {
            GesturePhase::Began => {
                inner.gestures.pinch_range = inner.camera.range;
                false
            }
            GesturePhase::Changed if scale > 0.0 && scale.is_finite() => {
                inner.camera.range = self.clamp_range(inner.gestures.pinch_range / scale);
                true
            }
            _ => false,
        });
        if changed {
            self.request_redraw();
        }
    }

    /// Two-finger rotation: turn the heading against the rotation in degrees.
    pub fn handle_rotation(&self, phase: GesturePhase, rotation: f64) {
        let changed = self.update_gesture(phase, |inner| match phase {
            GesturePhase::Began => {
                inner.gestures.rotation_heading = inner.camera.heading;
                false
            }
            GesturePhase::Changed if rotation.is_finite() => {
                inner.camera.heading = normalize_heading(inner.gestures.rotation_heading - rotation);
                true
            }
            _ => false,
        });
        if changed {
            self.request_redraw();
        }
    }

    /// Two-finger vertical pan: tilt by up to 90 degrees over the view
    /// height. Moving up tilts toward the horizon.
    pub fn handle_vertical_pan(&self, phase: GesturePhase, translation_y: f64) {
        let Some(viewport) = self.viewport() else {
            return;
        };
        let changed = self.update_gesture(phase, |inner| match phase {
            GesturePhase::Began => {
                inner.gestures.vertical_pan_tilt = inner.camera.tilt;
                false
            }
            GesturePhase::Changed if translation_y.is_finite() => {
                let delta = 90.0 * -translation_y / f64::from(viewport.height);
                inner.camera.tilt = (inner.gestures.vertical_pan_tilt + delta).clamp(0.0, 90.0);
                true
            }
            _ => false,
        });
        if changed {
            self.request_redraw();
        }
    }

    /// Secondary-button drag: heading follows x over 180 degrees per view
    /// width, tilt follows y over 90 degrees per view height.
    pub fn handle_secondary_drag(&self, phase: GesturePhase, translation: DVec2) {
        let Some(viewport) = self.viewport() else {
            return;
        };
        let changed = self.update_gesture(phase, |inner| match phase {
            GesturePhase::Began => {
                inner.gestures.drag_heading = inner.camera.heading;
                inner.gestures.drag_tilt = inner.camera.tilt;
                false
            }
            GesturePhase::Changed if translation.is_finite() => {
                let heading = 180.0 * translation.x / f64::from(viewport.width);
                let tilt = 90.0 * -translation.y / f64::from(viewport.height);
                inner.camera.heading = normalize_heading(inner.gestures.drag_heading + heading);
                inner.camera.tilt = (inner.gestures.drag_tilt + tilt).clamp(0.0, 90.0);
                true
            }
            _ => false,
        });
        if changed {
            self.request_redraw();
        }
    }

    /// Scroll wheel: positive `delta` (pixels) zooms in.
    ///
    /// The range changes by half a pixel per wheel pixel, measured at the
    /// current range. Any animation is cancelled.
    pub fn handle_wheel(&self, delta: f64) {
        let Some(viewport) = self.viewport() else {
            return;
        };
        if !delta.is_finite() || delta == 0.0 {
            return;
        }
        {
            let mut inner = self.lock();
            inner.animation = None;
            let range = inner.camera.range;
            let meters =
                delta * WHEEL_ZOOM_FACTOR * perspective_pixel_size(f64::from(viewport.height), range);
            inner.camera.range = self.clamp_range(range - meters);
        }
        self.request_redraw();
    }

    /// Apply a gesture update under the lock.
    ///
    /// `Began` cancels the running animation; `Changed` is dropped while one
    /// is running. Returns what `update` returned. Pan tracks its own
    /// baseline and does not go through here.
    fn update_gesture(
        &self,
        phase: GesturePhase,
        update: impl FnOnce(&mut NavigatorInner) -> bool,
    ) -> bool {
        let mut inner = self.lock();
        match phase {
            GesturePhase::Began => inner.animation = None,
            GesturePhase::Changed if inner.animation.is_some() => return false,
            _ => {}
        }
        update(&mut inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use orbis_geom::Globe;

    use super::*;
    use crate::navigate::{Camera, NavigatorConfig};
    use crate::view::{View, Viewport};

    fn navigator(view: &Arc<View>) -> Navigator {
        let config = NavigatorConfig {
            initial_camera: Camera {
                look_at: Location::new(10.0, 20.0),
                range: 100_000.0,
                heading: 0.0,
                tilt: 0.0,
            },
            ..NavigatorConfig::default()
        };
        Navigator::new(Arc::downgrade(view), Arc::new(Globe::wgs84()), config).unwrap()
    }

    fn view() -> Arc<View> {
        Arc::new(View::with_viewport(Viewport::new(800, 600)))
    }

    #[test]
    fn test_pinch_scales_range_from_baseline() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_pinch(GesturePhase::Began, 1.0);
        navigator.handle_pinch(GesturePhase::Changed, 2.0);
        assert!((navigator.range() - 50_000.0).abs() < 1e-9);
        // Cumulative, not incremental.
        navigator.handle_pinch(GesturePhase::Changed, 4.0);
        assert!((navigator.range() - 25_000.0).abs() < 1e-9);
        navigator.handle_pinch(GesturePhase::Ended, 4.0);
        assert!((navigator.range() - 25_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_turns_heading() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_rotation(GesturePhase::Began, 0.0);
        navigator.handle_rotation(GesturePhase::Changed, 30.0);
        assert!((navigator.heading() - 330.0).abs() < 1e-9);
    }

    #[test]
    fn test_pan_down_moves_look_at_north() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_pan(GesturePhase::Began, DVec2::ZERO);
        navigator.handle_pan(GesturePhase::Changed, DVec2::new(0.0, 50.0));
        let after = navigator.look_at();
        assert!(after.latitude > 10.0);
        assert!((after.longitude - 20.0).abs() < 1e-9);

        // Dragging right moves the look-at west.
        navigator.handle_pan(GesturePhase::Changed, DVec2::new(50.0, 50.0));
        assert!(navigator.look_at().longitude < 20.0);
    }

    #[test]
    fn test_vertical_pan_tilts_toward_horizon() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_vertical_pan(GesturePhase::Began, 0.0);
        navigator.handle_vertical_pan(GesturePhase::Changed, -300.0);
        assert!((navigator.tilt() - 45.0).abs() < 1e-9);
        navigator.handle_vertical_pan(GesturePhase::Changed, -6000.0);
        assert_eq!(navigator.tilt(), 90.0);
    }

    #[test]
    fn test_wheel_zooms_in_and_clamps() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_wheel(100.0);
        assert!(navigator.range() < 100_000.0);
        navigator.handle_wheel(-100.0);
        navigator.handle_wheel(1.0e9);
        assert_eq!(navigator.range(), navigator.config().min_range);
    }

    #[test]
    fn test_changed_is_ignored_while_animating_and_began_cancels() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_pinch(GesturePhase::Began, 1.0);
        navigator
            .animate_to(Location::new(0.0, 0.0), 1.0e6, Duration::from_secs(10))
            .unwrap();
        navigator.handle_pinch(GesturePhase::Changed, 2.0);
        assert!((navigator.range() - 100_000.0).abs() < 1e-9);

        navigator.handle_pinch(GesturePhase::Began, 1.0);
        assert!(!navigator.is_animating());
        navigator.handle_pinch(GesturePhase::Changed, 2.0);
        assert!((navigator.range() - 50_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_pan_during_animation_does_not_jump_afterwards() {
        let view = view();
        let navigator = navigator(&view);
        navigator.handle_pan(GesturePhase::Began, DVec2::ZERO);
        navigator
            .animate_to(Location::new(10.0, 20.0), 100_000.0, Duration::from_secs(10))
            .unwrap();
        navigator.handle_pan(GesturePhase::Changed, DVec2::new(0.0, 400.0));
        assert_eq!(navigator.look_at(), Location::new(10.0, 20.0));

        navigator.stop_animations();
        navigator.handle_pan(GesturePhase::Changed, DVec2::new(0.0, 401.0));
        let moved = navigator.look_at().latitude - 10.0;
        assert!(moved > 0.0);

        // A one pixel move at this range, not the 400 pixels dropped above.
        let meters_per_pixel = perspective_pixel_size(600.0, 100_000.0);
        let one_pixel = (meters_per_pixel / navigator.globe().equatorial_radius()).to_degrees();
        assert!((moved - one_pixel).abs() < 1e-9);
    }
}
