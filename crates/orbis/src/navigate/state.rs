//! Immutable per-frame camera snapshots.

use glam::{DMat4, DVec2, DVec3, DVec4};
use orbis_geom::matrix::{
    horizon_distance, look_at_modelview, perspective_near_distance,
    perspective_near_distance_for_far_distance, perspective_pixel_size, perspective_projection,
};
use orbis_geom::{Frustum, Globe, Position};

use crate::navigate::{Camera, NavigatorConfig};
use crate::view::Viewport;

/// Camera matrices and derived values for one frame.
///
/// A state is computed once per frame by
/// [`Navigator::current_state`](crate::navigate::Navigator::current_state)
/// and shared behind an `Arc`; it is never modified afterwards, so every
/// layer in a frame sees the same camera.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigatorState {
    /// Camera parameters the state was computed from.
    pub camera: Camera,
    pub modelview: DMat4,
    pub projection: DMat4,
    pub modelview_projection: DMat4,
    pub inverse_modelview: DMat4,
    pub inverse_projection: DMat4,
    pub inverse_modelview_projection: DMat4,
    pub viewport: Viewport,
    /// Eye point in model coordinates.
    pub eye_point: DVec3,
    /// Geodetic position of the eye.
    pub eye_position: Position,
    /// Unit view direction in model coordinates.
    pub forward: DVec3,
    /// Frustum in eye coordinates.
    pub frustum: Frustum,
    /// Frustum in model coordinates.
    pub frustum_in_model_coordinates: Frustum,
    /// Near clip distance in meters.
    pub near: f64,
    /// Far clip distance in meters.
    pub far: f64,
}

impl Default for NavigatorState {
    fn default() -> Self {
        let frustum = Frustum::from_projection(&DMat4::IDENTITY);
        Self {
            camera: Camera::default(),
            modelview: DMat4::IDENTITY,
            projection: DMat4::IDENTITY,
            modelview_projection: DMat4::IDENTITY,
            inverse_modelview: DMat4::IDENTITY,
            inverse_projection: DMat4::IDENTITY,
            inverse_modelview_projection: DMat4::IDENTITY,
            viewport: Viewport::new(1, 1),
            eye_point: DVec3::ZERO,
            eye_position: Position::default(),
            forward: DVec3::NEG_Z,
            frustum,
            frustum_in_model_coordinates: frustum,
            near: 1.0,
            far: 1.0,
        }
    }
}

impl NavigatorState {
    pub(crate) fn compute(
        globe: &Globe,
        camera: Camera,
        viewport: Option<Viewport>,
        config: &NavigatorConfig,
    ) -> Self {
        let look_at = Position::from_location(camera.look_at, globe.elevation(camera.look_at));
        let modelview =
            look_at_modelview(globe, look_at, camera.range, camera.heading, camera.tilt);
        let inverse_modelview = modelview.inverse();
        let eye_point = inverse_modelview.transform_point3(DVec3::ZERO);
        let eye_position = globe.cartesian_to_position(eye_point);
        let forward = inverse_modelview
            .transform_vector3(DVec3::NEG_Z)
            .normalize_or_zero();

        let (viewport, near, far) = match viewport.filter(Viewport::is_drawable) {
            Some(viewport) => {
                let (near, far) = clip_distances(globe, camera.range, eye_position, config);
                (viewport, near, far)
            }
            None => (Viewport::new(1, 1), config.default_near, config.default_far),
        };

        let projection = perspective_projection(
            f64::from(viewport.width),
            f64::from(viewport.height),
            near,
            far,
        );
        let modelview_projection = projection * modelview;
        let frustum = Frustum::from_projection(&projection);
        let frustum_in_model_coordinates = frustum.transformed(&modelview.transpose());

        Self {
            camera,
            modelview,
            projection,
            modelview_projection,
            inverse_modelview,
            inverse_projection: projection.inverse(),
            inverse_modelview_projection: modelview_projection.inverse(),
            viewport,
            eye_point,
            eye_position,
            forward,
            frustum,
            frustum_in_model_coordinates,
            near,
            far,
        }
    }

    /// Size in meters of one pixel at `distance` from the eye.
    #[must_use]
    pub fn pixel_size_at_distance(&self, distance: f64) -> f64 {
        perspective_pixel_size(f64::from(self.viewport.height), distance)
    }

    /// Screen coordinates (origin top left, y down) of a model point.
    ///
    /// Returns `None` for points behind the eye or outside the depth range.
    #[must_use]
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        let clip = self.modelview_projection * DVec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(DVec2::new(
            (ndc.x * 0.5 + 0.5) * f64::from(self.viewport.width),
            (0.5 - ndc.y * 0.5) * f64::from(self.viewport.height),
        ))
    }
}

/// Smallest far clip distance, for eyes at or just above the surface.
const MIN_FAR_DISTANCE: f64 = 1.0e3;

/// Near and far clip distances for an eye at `eye_position`.
///
/// The far plane reaches the horizon and at least twice the range, and
/// never comes closer than [`MIN_FAR_DISTANCE`] or twice the far resolution.
/// The near plane keeps the surface visible at the frustum edges but never
/// drops below what the depth buffer can resolve at the far plane.
fn clip_distances(
    globe: &Globe,
    range: f64,
    eye_position: Position,
    config: &NavigatorConfig,
) -> (f64, f64) {
    let eye_altitude = eye_position.altitude;
    let far = horizon_distance(globe.equatorial_radius(), eye_altitude)
        .max(2.0 * range)
        .max(MIN_FAR_DISTANCE)
        .max(2.0 * config.far_resolution);

    let distance_to_surface = (eye_altitude - globe.elevation(eye_position.location)).max(0.0);
    let near = perspective_near_distance(distance_to_surface).max(
        perspective_near_distance_for_far_distance(far, config.far_resolution, config.depth_bits),
    );
    (near, far)
}
