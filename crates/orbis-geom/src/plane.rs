//! Planes in Hessian normal form.

use glam::{DMat4, DVec3, DVec4};

/// A plane `normal · p + distance = 0`.
///
/// Points with a positive signed distance lie on the side the normal points
/// to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}

impl Plane {
    #[must_use]
    pub const fn new(normal: DVec3, distance: f64) -> Self {
        Self { normal, distance }
    }

    /// Create a plane from `ax + by + cz + d = 0`, normalizing the
    /// coefficients so the normal has unit length.
    ///
    /// Degenerate coefficients (a zero normal) are returned unnormalized.
    #[must_use]
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64) -> Self {
        let normal = DVec3::new(a, b, c);
        let len = normal.length();
        if len > 0.0 {
            Self::new(normal / len, d / len)
        } else {
            Self::new(normal, d)
        }
    }

    /// The plane as a homogeneous coefficient vector.
    #[must_use]
    pub fn coefficients(&self) -> DVec4 {
        self.normal.extend(self.distance)
    }

    /// Signed distance from the plane to a point.
    #[must_use]
    pub fn distance_to(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }

    /// Multiply the coefficient vector by `matrix` and renormalize.
    ///
    /// To move a plane from a space B into a space A, pass the transpose of
    /// the matrix mapping A to B.
    #[must_use]
    pub fn transformed(&self, matrix: &DMat4) -> Self {
        let v = *matrix * self.coefficients();
        Self::from_coefficients(v.x, v.y, v.z, v.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_coefficients_normalizes() {
        let plane = Plane::from_coefficients(0.0, 0.0, 2.0, 4.0);
        assert_eq!(plane.normal, DVec3::Z);
        assert_eq!(plane.distance, 2.0);
        assert_eq!(plane.distance_to(DVec3::new(5.0, 5.0, -2.0)), 0.0);
    }

    #[test]
    fn test_transformed_follows_translation() {
        // z >= 0 in B, where B = A translated by -10 along z.
        let plane = Plane::new(DVec3::Z, 0.0);
        let a_to_b = DMat4::from_translation(DVec3::new(0.0, 0.0, -10.0));
        let in_a = plane.transformed(&a_to_b.transpose());
        assert!((in_a.distance_to(DVec3::new(0.0, 0.0, 10.0))).abs() < 1e-12);
        assert!(in_a.distance_to(DVec3::new(0.0, 0.0, 11.0)) > 0.0);
    }
}
