//! Ellipsoidal globe model and coordinate conversion.
//!
//! Cartesian coordinates are Earth-centered, Earth-fixed: +Z points to the
//! north pole, +X to latitude 0 longitude 0 and +Y to latitude 0 longitude
//! 90 east.

use std::fmt;
use std::sync::Arc;

use glam::{DMat4, DVec3, DVec4};

use crate::error::{GeomError, GeomResult};
use crate::location::{Location, Position};
use crate::sector::Sector;

/// WGS84 semi-major axis in meters.
pub const WGS84_EQUATORIAL_RADIUS: f64 = 6_378_137.0;

/// WGS84 semi-minor axis in meters.
pub const WGS84_POLAR_RADIUS: f64 = 6_356_752.3142;

/// Source of terrain heights above the ellipsoid.
pub trait ElevationModel: Send + Sync + fmt::Debug {
    /// Elevation in meters at a location.
    fn elevation(&self, location: Location) -> f64;

    /// Lower and upper bounds of the elevations within a sector.
    fn extreme_elevations(&self, sector: &Sector) -> (f64, f64);
}

/// An elevation model that is zero everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroElevationModel;

impl ElevationModel for ZeroElevationModel {
    fn elevation(&self, _location: Location) -> f64 {
        0.0
    }

    fn extreme_elevations(&self, _sector: &Sector) -> (f64, f64) {
        (0.0, 0.0)
    }
}

/// An oblate ellipsoid with an attached elevation model.
#[derive(Debug, Clone)]
pub struct Globe {
    equatorial_radius: f64,
    polar_radius: f64,
    eccentricity_squared: f64,
    elevation_model: Arc<dyn ElevationModel>,
}

impl Globe {
    /// The WGS84 ellipsoid with zero elevation.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::from_radii(
            WGS84_EQUATORIAL_RADIUS,
            WGS84_POLAR_RADIUS,
            Arc::new(ZeroElevationModel),
        )
    }

    /// Create a globe from its radii.
    ///
    /// Fails when a radius is not a positive finite number or when the polar
    /// radius exceeds the equatorial radius.
    pub fn new(
        equatorial_radius: f64,
        polar_radius: f64,
        elevation_model: Arc<dyn ElevationModel>,
    ) -> GeomResult<Self> {
        for (name, radius) in [("equatorial", equatorial_radius), ("polar", polar_radius)] {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(GeomError::invalid(
                    "globe",
                    format!("{name} radius must be positive, got {radius}"),
                ));
            }
        }
        if polar_radius > equatorial_radius {
            return Err(GeomError::invalid(
                "globe",
                format!("polar radius {polar_radius} exceeds equatorial radius {equatorial_radius}"),
            ));
        }
        Ok(Self::from_radii(
            equatorial_radius,
            polar_radius,
            elevation_model,
        ))
    }

    fn from_radii(
        equatorial_radius: f64,
        polar_radius: f64,
        elevation_model: Arc<dyn ElevationModel>,
    ) -> Self {
        let ratio = polar_radius / equatorial_radius;
        Self {
            equatorial_radius,
            polar_radius,
            eccentricity_squared: 1.0 - ratio * ratio,
            elevation_model,
        }
    }

    /// Replace the elevation model.
    #[must_use]
    pub fn with_elevation_model(mut self, elevation_model: Arc<dyn ElevationModel>) -> Self {
        self.elevation_model = elevation_model;
        self
    }

    #[must_use]
    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    #[must_use]
    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    #[must_use]
    pub fn eccentricity_squared(&self) -> f64 {
        self.eccentricity_squared
    }

    #[must_use]
    pub fn elevation_model(&self) -> &Arc<dyn ElevationModel> {
        &self.elevation_model
    }

    /// Terrain elevation at a location in meters.
    #[must_use]
    pub fn elevation(&self, location: Location) -> f64 {
        self.elevation_model.elevation(location)
    }

    /// Convert geodetic coordinates (degrees, meters) to Cartesian.
    #[must_use]
    pub fn geodetic_to_cartesian(&self, latitude: f64, longitude: f64, altitude: f64) -> DVec3 {
        let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
        let n = self.prime_vertical_radius(sin_lat);

        DVec3::new(
            (n + altitude) * cos_lat * cos_lon,
            (n + altitude) * cos_lat * sin_lon,
            (n * (1.0 - self.eccentricity_squared) + altitude) * sin_lat,
        )
    }

    /// Convert a position to Cartesian coordinates.
    #[must_use]
    pub fn position_to_cartesian(&self, position: Position) -> DVec3 {
        self.geodetic_to_cartesian(position.latitude(), position.longitude(), position.altitude)
    }

    /// Convert Cartesian coordinates back to a geodetic position.
    #[must_use]
    pub fn cartesian_to_position(&self, point: DVec3) -> Position {
        let a = self.equatorial_radius;
        let e2 = self.eccentricity_squared;
        let p = point.x.hypot(point.y);

        // On the polar axis the longitude is undefined; report zero.
        if p < 1e-9 {
            let latitude = if point.z >= 0.0 { 90.0 } else { -90.0 };
            return Position::new(latitude, 0.0, point.z.abs() - self.polar_radius);
        }

        let longitude = point.y.atan2(point.x);
        let mut latitude = point.z.atan2(p * (1.0 - e2));
        for _ in 0..10 {
            let sin_lat = latitude.sin();
            let n = self.prime_vertical_radius(sin_lat);
            let altitude = p * latitude.cos() + point.z * sin_lat - a * a / n;
            let next = point.z.atan2(p * (1.0 - e2 * n / (n + altitude)));
            let converged = (next - latitude).abs() < 1e-14;
            latitude = next;
            if converged {
                break;
            }
        }

        let (sin_lat, cos_lat) = latitude.sin_cos();
        let n = self.prime_vertical_radius(sin_lat);
        let altitude = p * cos_lat + point.z * sin_lat - a * a / n;
        Position::new(latitude.to_degrees(), longitude.to_degrees(), altitude)
    }

    /// Outward unit normal of the ellipsoid at a location.
    #[must_use]
    pub fn surface_normal(&self, location: Location) -> DVec3 {
        let (sin_lat, cos_lat) = location.latitude_radians().sin_cos();
        let (sin_lon, cos_lon) = location.longitude_radians().sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    /// Local east-north-up frame at a position.
    ///
    /// The matrix columns are the east, north and up unit vectors followed by
    /// the Cartesian point, so it maps local coordinates to globe coordinates.
    #[must_use]
    pub fn local_frame(&self, position: Position) -> DMat4 {
        let (sin_lat, cos_lat) = position.location.latitude_radians().sin_cos();
        let (sin_lon, cos_lon) = position.location.longitude_radians().sin_cos();

        let east = DVec3::new(-sin_lon, cos_lon, 0.0);
        let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let up = self.surface_normal(position.location);
        let origin = self.position_to_cartesian(position);

        DMat4::from_cols(
            east.extend(0.0),
            north.extend(0.0),
            up.extend(0.0),
            DVec4::new(origin.x, origin.y, origin.z, 1.0),
        )
    }

    /// Radius of curvature in the prime vertical.
    fn prime_vertical_radius(&self, sin_lat: f64) -> f64 {
        self.equatorial_radius / (1.0 - self.eccentricity_squared * sin_lat * sin_lat).sqrt()
    }
}

impl Default for Globe {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_radius() {
        let zero = Arc::new(ZeroElevationModel);
        assert!(Globe::new(0.0, 1.0, zero.clone()).is_err());
        assert!(Globe::new(1.0, -1.0, zero.clone()).is_err());
        assert!(Globe::new(1.0, 2.0, zero.clone()).is_err());
        assert!(Globe::new(2.0, 1.0, zero).is_ok());
    }

    #[test]
    fn test_cardinal_points() {
        let globe = Globe::wgs84();
        let origin = globe.geodetic_to_cartesian(0.0, 0.0, 0.0);
        assert!((origin - DVec3::new(WGS84_EQUATORIAL_RADIUS, 0.0, 0.0)).length() < 1e-6);

        let east = globe.geodetic_to_cartesian(0.0, 90.0, 0.0);
        assert!((east - DVec3::new(0.0, WGS84_EQUATORIAL_RADIUS, 0.0)).length() < 1e-6);

        let pole = globe.geodetic_to_cartesian(90.0, 0.0, 0.0);
        assert!((pole - DVec3::new(0.0, 0.0, WGS84_POLAR_RADIUS)).length() < 1e-3);
    }

    #[test]
    fn test_cartesian_round_trip() {
        let globe = Globe::wgs84();
        for &(lat, lon, alt) in &[
            (0.0, 0.0, 0.0),
            (64.0, -150.0, 10_000.0),
            (-33.9, 151.2, 120.0),
            (89.5, 45.0, 500.0),
            (-89.9, -120.0, 0.0),
        ] {
            let point = globe.geodetic_to_cartesian(lat, lon, alt);
            let position = globe.cartesian_to_position(point);
            assert!((position.latitude() - lat).abs() < 1e-9, "{lat} {position:?}");
            assert!((position.longitude() - lon).abs() < 1e-9, "{lon} {position:?}");
            assert!((position.altitude - alt).abs() < 1e-4, "{alt} {position:?}");
        }
    }

    #[test]
    fn test_pole_round_trip() {
        let globe = Globe::wgs84();
        let point = DVec3::new(0.0, 0.0, WGS84_POLAR_RADIUS + 100.0);
        let position = globe.cartesian_to_position(point);
        assert_eq!(position.latitude(), 90.0);
        assert!((position.altitude - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_local_frame_is_orthonormal_and_up_is_normal() {
        let globe = Globe::wgs84();
        let position = Position::new(64.0, -150.0, 0.0);
        let frame = globe.local_frame(position);
        let east = frame.x_axis.truncate();
        let north = frame.y_axis.truncate();
        let up = frame.z_axis.truncate();

        assert!(east.dot(north).abs() < 1e-12);
        assert!(east.dot(up).abs() < 1e-12);
        assert!(north.dot(up).abs() < 1e-12);
        assert!((east.cross(north) - up).length() < 1e-12);

        let origin = frame.w_axis.truncate();
        assert!((origin - globe.position_to_cartesian(position)).length() < 1e-6);
    }
}
