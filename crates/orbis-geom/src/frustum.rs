//! View frustums for visibility tests.

use glam::{DMat4, DVec3};

use crate::plane::Plane;

/// Six inward-facing planes bounding a view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    planes: [Plane; 6],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// Create a frustum from six planes ordered left, right, bottom, top,
    /// near, far.
    #[must_use]
    pub const fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract the clip planes of a projection (or view-projection) matrix
    /// with OpenGL depth range `[-1, 1]`.
    ///
    /// The planes are expressed in the space the matrix maps from.
    #[must_use]
    pub fn from_projection(matrix: &DMat4) -> Self {
        let m = matrix.to_cols_array_2d();
        let row = |i: usize| [m[0][i], m[1][i], m[2][i], m[3][i]];
        let r3 = row(3);
        let plane = |r: [f64; 4], sign: f64| {
            Plane::from_coefficients(
                r3[0] + sign * r[0],
                r3[1] + sign * r[1],
                r3[2] + sign * r[2],
                r3[3] + sign * r[3],
            )
        };

        let (r0, r1, r2) = (row(0), row(1), row(2));
        Self {
            planes: [
                plane(r0, 1.0),
                plane(r0, -1.0),
                plane(r1, 1.0),
                plane(r1, -1.0),
                plane(r2, 1.0),
                plane(r2, -1.0),
            ],
        }
    }

    /// Move every plane by `matrix` (see [`Plane::transformed`]).
    #[must_use]
    pub fn transformed(&self, matrix: &DMat4) -> Self {
        Self {
            planes: self.planes.map(|p| p.transformed(matrix)),
        }
    }

    #[must_use]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    #[must_use]
    pub fn near(&self) -> &Plane {
        &self.planes[Self::NEAR]
    }

    #[must_use]
    pub fn far(&self) -> &Plane {
        &self.planes[Self::FAR]
    }

    /// Whether a point lies inside or on the boundary of the frustum.
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.planes.iter().all(|p| p.distance_to(point) >= 0.0)
    }

    /// Whether a sphere may intersect the frustum.
    ///
    /// Conservative: spheres near a frustum corner can pass although they
    /// lie outside.
    #[must_use]
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.planes
            .iter()
            .all(|p| p.distance_to(center) > -radius)
    }

    /// Whether a line segment may intersect the frustum.
    ///
    /// A segment is rejected only when both end points lie behind the same
    /// plane.
    #[must_use]
    pub fn intersects_segment(&self, a: DVec3, b: DVec3) -> bool {
        if self.contains_point(a) || self.contains_point(b) {
            return true;
        }
        self.planes
            .iter()
            .all(|p| p.distance_to(a) >= 0.0 || p.distance_to(b) >= 0.0)
    }
}
