//! Geographic rectangles bounded by parallels and meridians.

use crate::error::{GeomError, GeomResult};
use crate::location::Location;

/// A latitude/longitude aligned rectangle in degrees.
///
/// Sectors never span the antimeridian: `min_longitude <= max_longitude`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Sector {
    /// The whole globe.
    pub const FULL: Self = Self {
        min_latitude: -90.0,
        max_latitude: 90.0,
        min_longitude: -180.0,
        max_longitude: 180.0,
    };

    /// Create a sector without validation.
    #[must_use]
    pub const fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Self {
        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    /// Create a sector, rejecting inverted or non-finite bounds.
    pub fn checked(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> GeomResult<Self> {
        let bounds = [min_latitude, max_latitude, min_longitude, max_longitude];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(GeomError::invalid("sector", "non-finite bounds"));
        }
        if min_latitude > max_latitude || min_longitude > max_longitude {
            return Err(GeomError::invalid(
                "sector",
                format!(
                    "inverted bounds lat [{min_latitude}, {max_latitude}] lon [{min_longitude}, {max_longitude}]"
                ),
            ));
        }
        Ok(Self::new(
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        ))
    }

    #[must_use]
    pub fn delta_latitude(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    #[must_use]
    pub fn delta_longitude(&self) -> f64 {
        self.max_longitude - self.min_longitude
    }

    #[must_use]
    pub fn centroid(&self) -> Location {
        Location::new(
            0.5 * (self.min_latitude + self.max_latitude),
            0.5 * (self.min_longitude + self.max_longitude),
        )
    }

    /// Whether the sector covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delta_latitude() <= 0.0 || self.delta_longitude() <= 0.0
    }

    /// Whether `location` lies inside or on the boundary of this sector.
    #[must_use]
    pub fn contains(&self, location: Location) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&location.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&location.longitude)
    }

    /// Whether the interiors of the two sectors overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Sector) -> bool {
        self.min_longitude < other.max_longitude
            && other.min_longitude < self.max_longitude
            && self.min_latitude < other.max_latitude
            && other.min_latitude < self.max_latitude
    }

    /// The overlapping region, or `None` when the sectors do not overlap.
    #[must_use]
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Sector::new(
            self.min_latitude.max(other.min_latitude),
            self.max_latitude.min(other.max_latitude),
            self.min_longitude.max(other.min_longitude),
            self.max_longitude.min(other.max_longitude),
        ))
    }

    /// The smallest sector containing both sectors.
    #[must_use]
    pub fn union(&self, other: &Sector) -> Sector {
        Sector::new(
            self.min_latitude.min(other.min_latitude),
            self.max_latitude.max(other.max_latitude),
            self.min_longitude.min(other.min_longitude),
            self.max_longitude.max(other.max_longitude),
        )
    }

    /// The four corners, counterclockwise from the south-west.
    #[must_use]
    pub fn corners(&self) -> [Location; 4] {
        [
            Location::new(self.min_latitude, self.min_longitude),
            Location::new(self.min_latitude, self.max_longitude),
            Location::new(self.max_latitude, self.max_longitude),
            Location::new(self.max_latitude, self.min_longitude),
        ]
    }

    /// Split into four quadrants: south-west, south-east, north-west,
    /// north-east.
    #[must_use]
    pub fn subdivide(&self) -> [Sector; 4] {
        let mid = self.centroid();
        [
            Sector::new(
                self.min_latitude,
                mid.latitude,
                self.min_longitude,
                mid.longitude,
            ),
            Sector::new(
                self.min_latitude,
                mid.latitude,
                mid.longitude,
                self.max_longitude,
            ),
            Sector::new(
                mid.latitude,
                self.max_latitude,
                self.min_longitude,
                mid.longitude,
            ),
            Sector::new(
                mid.latitude,
                self.max_latitude,
                mid.longitude,
                self.max_longitude,
            ),
        ]
    }
}

impl Default for Sector {
    fn default() -> Self {
        Self::FULL
    }
}
