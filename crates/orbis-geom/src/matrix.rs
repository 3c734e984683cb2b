//! Camera transforms and perspective helpers.
//!
//! Eye coordinates follow the OpenGL convention: the camera sits at the
//! origin looking down -Z with +Y up.

use glam::{DMat4, DVec3};

use crate::globe::Globe;
use crate::location::Position;

/// Vertical field of view of the perspective projection, in degrees.
pub const FIELD_OF_VIEW_DEGREES: f64 = 45.0;

/// Modelview matrix for a camera orbiting a target position.
///
/// Composed as a translation back along the view axis by `range`, a tilt
/// away from nadir, a rotation by `heading` (degrees clockwise from north)
/// and the inverse of the target's local east-north-up frame.
#[must_use]
pub fn look_at_modelview(
    globe: &Globe,
    look_at: Position,
    range: f64,
    heading: f64,
    tilt: f64,
) -> DMat4 {
    let frame = globe.local_frame(look_at);
    DMat4::from_translation(DVec3::new(0.0, 0.0, -range))
        * DMat4::from_rotation_x(-tilt.to_radians())
        * DMat4::from_rotation_z(heading.to_radians())
        * frame.inverse()
}

/// Perspective projection with the standard field of view.
#[must_use]
pub fn perspective_projection(viewport_width: f64, viewport_height: f64, near: f64, far: f64) -> DMat4 {
    let aspect = if viewport_height > 0.0 {
        viewport_width / viewport_height
    } else {
        1.0
    };
    DMat4::perspective_rh_gl(FIELD_OF_VIEW_DEGREES.to_radians(), aspect, near, far)
}

/// Distance from a point at `altitude` above a sphere of `radius` to its
/// horizon.
#[must_use]
pub fn horizon_distance(radius: f64, altitude: f64) -> f64 {
    if altitude <= 0.0 {
        return 0.0;
    }
    (altitude * (2.0 * radius + altitude)).sqrt()
}

/// Near clip distance that keeps a surface `distance_to_surface` away fully
/// visible at the frustum edges.
#[must_use]
pub fn perspective_near_distance(distance_to_surface: f64) -> f64 {
    let tan_half_fov = (FIELD_OF_VIEW_DEGREES.to_radians() / 2.0).tan();
    distance_to_surface / (2.0 * (2.0 * tan_half_fov * tan_half_fov + 1.0).sqrt())
}

/// Smallest near distance that still resolves `far_resolution` meters at
/// `far_distance` with a depth buffer of `depth_bits` bits.
#[must_use]
pub fn perspective_near_distance_for_far_distance(
    far_distance: f64,
    far_resolution: f64,
    depth_bits: u32,
) -> f64 {
    let max_depth = f64::from((1u32 << depth_bits.min(31)) - 1);
    far_distance / (max_depth / (1.0 - far_resolution / far_distance) - max_depth + 1.0)
}

/// Size in meters of one pixel at `distance` from the eye.
#[must_use]
pub fn perspective_pixel_size(viewport_height: f64, distance: f64) -> f64 {
    let frustum_height = 2.0 * distance * (FIELD_OF_VIEW_DEGREES.to_radians() / 2.0).tan();
    frustum_height / viewport_height.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use glam::DVec4;

    #[test]
    fn test_look_at_places_target_in_front_of_eye() {
        let globe = Globe::wgs84();
        let target = Position::new(64.0, -150.0, 0.0);
        let modelview = look_at_modelview(&globe, target, 10_000.0, 0.0, 0.0);

        let eye_target = modelview * globe.position_to_cartesian(target).extend(1.0);
        assert!((eye_target - DVec4::new(0.0, 0.0, -10_000.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_heading_rotates_north_off_screen_up() {
        let globe = Globe::wgs84();
        let target = Position::new(0.0, 0.0, 0.0);
        let north = globe.geodetic_to_cartesian(0.01, 0.0, 0.0).extend(1.0);
        let east = globe.geodetic_to_cartesian(0.0, 0.01, 0.0).extend(1.0);

        let facing_north = look_at_modelview(&globe, target, 1000.0, 0.0, 0.0);
        assert!((facing_north * north).y > 0.0);

        let facing_east = look_at_modelview(&globe, target, 1000.0, 90.0, 0.0);
        assert!((facing_east * east).y > 0.0);
        assert!((facing_east * north).x < 0.0);
    }

    #[test]
    fn test_tilt_pushes_far_side_away() {
        let globe = Globe::wgs84();
        let target = Position::from(Location::new(0.0, 0.0));
        let north = globe.geodetic_to_cartesian(0.01, 0.0, 0.0).extend(1.0);

        let flat = look_at_modelview(&globe, target, 1000.0, 0.0, 0.0);
        let tilted = look_at_modelview(&globe, target, 1000.0, 0.0, 45.0);
        assert!((tilted * north).z < (flat * north).z);
    }

    #[test]
    fn test_horizon_and_near_distances() {
        assert_eq!(horizon_distance(6_378_137.0, 0.0), 0.0);
        let horizon = horizon_distance(6_378_137.0, 10_000.0);
        assert!((horizon - 357_275.0).abs() < 100.0);

        let near = perspective_near_distance(10_000.0);
        assert!(near > 0.0 && near < 10_000.0);

        // Resolving 10 m at the horizon with a 24-bit depth buffer.
        let limit = perspective_near_distance_for_far_distance(horizon, 10.0, 24);
        assert!(limit > 700.0 && limit < 800.0, "{limit}");
    }

    #[test]
    fn test_pixel_size_grows_with_distance() {
        let near = perspective_pixel_size(1000.0, 100.0);
        let far = perspective_pixel_size(1000.0, 1000.0);
        assert!((far / near - 10.0).abs() < 1e-9);
    }
}
