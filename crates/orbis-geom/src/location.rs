//! Geodetic locations and positions.
//!
//! A [`Location`] is a raw pair of latitude and longitude in degrees. Values
//! are never normalized implicitly: arithmetic works on the raw degrees, and
//! only the path functions (great circle and rhumb line) normalize the end
//! longitude they compute.
//!
//! Locations are plain `Copy` values. Every operation returns a new value, so
//! a location shared between components can never be changed underneath them.

use std::ops::{Add, Sub};

use crate::angle::{normalize_latitude, normalize_longitude};
use crate::error::{GeomError, GeomResult};

/// Tolerance below which the Mercator stretch of a rhumb line is treated as
/// zero (an east-west course).
const RHUMB_STRETCH_EPSILON: f64 = 1e-12;

/// A geographic location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Location {
    /// The location at latitude 0, longitude 0.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a location from degrees without validation.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a location, rejecting non-finite components.
    pub fn checked(latitude: f64, longitude: f64) -> GeomResult<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeomError::invalid(
                "location",
                format!("non-finite coordinates ({latitude}, {longitude})"),
            ));
        }
        Ok(Self::new(latitude, longitude))
    }

    /// Create a location from radians.
    #[must_use]
    pub fn from_radians(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude.to_degrees(), longitude.to_degrees())
    }

    /// Create a location whose longitude is the center of a time zone.
    ///
    /// The longitude is `offset_hours / 24 * 360`, where the offset is the
    /// zone's standard offset east of UTC. Daylight saving is not taken into
    /// account.
    #[must_use]
    pub fn from_time_zone_offset(latitude: f64, utc_offset_seconds: i32) -> Self {
        let hours = f64::from(utc_offset_seconds) / 3600.0;
        Self::new(latitude, hours / 24.0 * 360.0)
    }

    /// Return a copy with a different latitude.
    #[must_use]
    pub const fn with_latitude(self, latitude: f64) -> Self {
        Self::new(latitude, self.longitude)
    }

    /// Return a copy with a different longitude.
    #[must_use]
    pub const fn with_longitude(self, longitude: f64) -> Self {
        Self::new(self.latitude, longitude)
    }

    /// Latitude in radians.
    #[must_use]
    pub fn latitude_radians(self) -> f64 {
        self.latitude.to_radians()
    }

    /// Longitude in radians.
    #[must_use]
    pub fn longitude_radians(self) -> f64 {
        self.longitude.to_radians()
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Return a copy with the latitude reflected into `[-90, 90]` and the
    /// longitude wrapped into `[-180, 180]`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::new(
            normalize_latitude(self.latitude),
            normalize_longitude(self.longitude),
        )
    }

    /// Destination of a great-circle path from this location.
    ///
    /// `azimuth` is in degrees clockwise from north and `distance` is an
    /// angular distance in degrees on the unit sphere. A zero distance
    /// returns this location unchanged; otherwise the end longitude is
    /// normalized into `[-180, 180]`.
    #[must_use]
    pub fn great_circle_end(self, azimuth: f64, distance: f64) -> Self {
        if distance == 0.0 {
            return self;
        }

        let lat1 = self.latitude_radians();
        let lon1 = self.longitude_radians();
        let az = azimuth.to_radians();
        let d = distance.to_radians();
        let (sin_lat1, cos_lat1) = lat1.sin_cos();
        let (sin_d, cos_d) = d.sin_cos();

        let lat2 = (sin_lat1 * cos_d + cos_lat1 * sin_d * az.cos()).asin();
        let lon2 = lon1 + (az.sin() * sin_d * cos_lat1).atan2(cos_d - sin_lat1 * lat2.sin());

        if lat2.is_nan() || lon2.is_nan() {
            return self;
        }

        Self::new(
            normalize_latitude(lat2.to_degrees()),
            normalize_longitude(lon2.to_degrees()),
        )
    }

    /// Initial azimuth in degrees of the great-circle path to `other`.
    ///
    /// Returns 0 when the two locations coincide.
    #[must_use]
    pub fn great_circle_azimuth(self, other: Self) -> f64 {
        let lat1 = self.latitude_radians();
        let lat2 = other.latitude_radians();
        let dlon = other.longitude_radians() - self.longitude_radians();

        if self == other {
            return 0.0;
        }

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        let azimuth = y.atan2(x);
        if azimuth.is_nan() {
            0.0
        } else {
            azimuth.to_degrees()
        }
    }

    /// Angular great-circle distance in degrees to `other` (haversine).
    #[must_use]
    pub fn great_circle_distance(self, other: Self) -> f64 {
        let lat1 = self.latitude_radians();
        let lat2 = other.latitude_radians();
        let dlat = lat2 - lat1;
        let dlon = other.longitude_radians() - self.longitude_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        c.to_degrees()
    }

    /// Location a fraction `amount` of the way along the great circle to
    /// `other`. `amount` is clamped to `[0, 1]`.
    #[must_use]
    pub fn interpolate_great_circle(self, other: Self, amount: f64) -> Self {
        if self == other {
            return self;
        }
        let t = amount.clamp(0.0, 1.0);
        let azimuth = self.great_circle_azimuth(other);
        let distance = self.great_circle_distance(other);
        self.great_circle_end(azimuth, distance * t)
    }

    /// Destination of a rhumb line (constant bearing) from this location.
    ///
    /// `azimuth` is in degrees clockwise from north and `distance` is an
    /// angular distance in degrees. A zero distance returns this location
    /// unchanged. Courses that cross a pole are reflected back onto the
    /// sphere.
    #[must_use]
    pub fn rhumb_end(self, azimuth: f64, distance: f64) -> Self {
        if distance == 0.0 {
            return self;
        }

        let lat1 = self.latitude_radians();
        let lon1 = self.longitude_radians();
        let az = azimuth.to_radians();
        let d = distance.to_radians();

        let mut lat2 = lat1 + d * az.cos();
        if lat2.abs() > std::f64::consts::FRAC_PI_2 {
            lat2 = if lat2 > 0.0 {
                std::f64::consts::PI - lat2
            } else {
                -std::f64::consts::PI - lat2
            };
        }

        let q = rhumb_stretch_ratio(lat1, lat2);
        let lon2 = lon1 + d * az.sin() / q;

        if lat2.is_nan() || lon2.is_nan() {
            return self;
        }

        Self::new(lat2.to_degrees(), normalize_longitude(lon2.to_degrees()))
    }

    /// Constant azimuth in degrees of the rhumb line to `other`.
    #[must_use]
    pub fn rhumb_azimuth(self, other: Self) -> f64 {
        if self == other {
            return 0.0;
        }

        let lat1 = self.latitude_radians();
        let lat2 = other.latitude_radians();
        let mut dlon = other.longitude_radians() - self.longitude_radians();
        let dphi = mercator_stretch(lat1, lat2);

        if dlon.abs() > std::f64::consts::PI {
            dlon = if dlon > 0.0 {
                -(std::f64::consts::TAU - dlon)
            } else {
                std::f64::consts::TAU + dlon
            };
        }

        let azimuth = dlon.atan2(dphi);
        if azimuth.is_nan() {
            0.0
        } else {
            azimuth.to_degrees()
        }
    }

    /// Angular length in degrees of the rhumb line to `other`.
    #[must_use]
    pub fn rhumb_distance(self, other: Self) -> f64 {
        let lat1 = self.latitude_radians();
        let lat2 = other.latitude_radians();
        let dlat = lat2 - lat1;
        let mut dlon = (other.longitude_radians() - self.longitude_radians()).abs();
        if dlon > std::f64::consts::PI {
            dlon = std::f64::consts::TAU - dlon;
        }

        let q = rhumb_stretch_ratio(lat1, lat2);
        (dlat * dlat + q * q * dlon * dlon).sqrt().to_degrees()
    }
}

/// Difference in Mercator-projected latitude between two latitudes (radians).
fn mercator_stretch(lat1: f64, lat2: f64) -> f64 {
    let quarter = std::f64::consts::FRAC_PI_4;
    ((lat2 / 2.0 + quarter).tan() / (lat1 / 2.0 + quarter).tan()).ln()
}

/// Ratio of true to projected latitude change along a rhumb line.
///
/// Falls back to `cos(lat1)` for east-west courses, where the projected
/// change is zero.
fn rhumb_stretch_ratio(lat1: f64, lat2: f64) -> f64 {
    let dphi = mercator_stretch(lat1, lat2);
    let q = (lat2 - lat1) / dphi;
    if dphi.abs() < RHUMB_STRETCH_EPSILON || !q.is_finite() {
        lat1.cos()
    } else {
        q
    }
}

impl Add for Location {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.latitude + rhs.latitude, self.longitude + rhs.longitude)
    }
}

impl Sub for Location {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.latitude - rhs.latitude, self.longitude - rhs.longitude)
    }
}

/// A geographic location plus an altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub location: Location,
    /// Height above the ellipsoid in meters.
    pub altitude: f64,
}

impl Position {
    /// Create a position from degrees and meters.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            location: Location::new(latitude, longitude),
            altitude,
        }
    }

    /// Create a position at `altitude` above a location.
    #[must_use]
    pub const fn from_location(location: Location, altitude: f64) -> Self {
        Self { location, altitude }
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.location.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.location.longitude
    }
}

impl From<Location> for Position {
    fn from(location: Location) -> Self {
        Self::from_location(location, 0.0)
    }
}
