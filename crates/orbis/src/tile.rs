//! Tile pyramid addressing shared by terrain and imagery.
//!
//! Level zero divides the globe into square tiles of a fixed angular size,
//! rows counted north from the south pole and columns east from the
//! antimeridian. Every level halves the tile size.

use glam::DVec3;
use orbis_geom::{Globe, Location, Sector};

/// Address of a tile in a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: u32,
    pub row: u32,
    pub column: u32,
}

impl TileKey {
    #[must_use]
    pub const fn new(level: u32, row: u32, column: u32) -> Self {
        Self { level, row, column }
    }

    /// The four children, ordered like [`Sector::subdivide`]: south-west,
    /// south-east, north-west, north-east.
    #[must_use]
    pub fn children(&self) -> [TileKey; 4] {
        let (level, row, column) = (self.level + 1, self.row * 2, self.column * 2);
        [
            TileKey::new(level, row, column),
            TileKey::new(level, row, column + 1),
            TileKey::new(level, row + 1, column),
            TileKey::new(level, row + 1, column + 1),
        ]
    }
}

/// Geometry of a tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSet {
    /// Size in degrees of a level-zero tile.
    pub level_zero_delta: f64,
    /// Number of levels; the last level is `num_levels - 1`.
    pub num_levels: u32,
    /// Texels (or cells) along each side of a tile.
    pub tile_size: u32,
}

impl Default for LevelSet {
    fn default() -> Self {
        Self {
            level_zero_delta: 45.0,
            num_levels: 16,
            tile_size: 256,
        }
    }
}

impl LevelSet {
    /// Angular size of tiles at `level`.
    #[must_use]
    pub fn tile_delta(&self, level: u32) -> f64 {
        self.level_zero_delta / f64::from(1u32 << level.min(31))
    }

    #[must_use]
    pub fn last_level(&self) -> u32 {
        self.num_levels.saturating_sub(1)
    }

    /// Sector covered by a tile.
    #[must_use]
    pub fn tile_sector(&self, key: TileKey) -> Sector {
        let delta = self.tile_delta(key.level);
        let min_latitude = -90.0 + f64::from(key.row) * delta;
        let min_longitude = -180.0 + f64::from(key.column) * delta;
        Sector::new(
            min_latitude,
            (min_latitude + delta).min(90.0),
            min_longitude,
            (min_longitude + delta).min(180.0),
        )
    }

    /// Keys of the level-zero tiles.
    pub fn level_zero_keys(&self) -> impl Iterator<Item = TileKey> + use<> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (rows, columns) = (
            (180.0 / self.level_zero_delta).ceil() as u32,
            (360.0 / self.level_zero_delta).ceil() as u32,
        );
        (0..rows).flat_map(move |row| (0..columns).map(move |column| TileKey::new(0, row, column)))
    }

    /// Size in meters of one texel (or cell) of a tile at `level` on the
    /// equator of a globe with `radius`.
    #[must_use]
    pub fn texel_size(&self, level: u32, radius: f64) -> f64 {
        self.tile_delta(level).to_radians() * radius / f64::from(self.tile_size.max(1))
    }
}

/// Sample points of a sector at the given altitude: corners, edge midpoints
/// and centroid.
#[must_use]
pub fn sector_points(globe: &Globe, sector: &Sector, altitude: f64) -> [DVec3; 9] {
    let mid = sector.centroid();
    let point = |latitude, longitude| globe.geodetic_to_cartesian(latitude, longitude, altitude);
    let [sw, se, ne, nw] = sector.corners();
    let at = |l: Location| point(l.latitude, l.longitude);
    [
        at(sw),
        at(se),
        at(ne),
        at(nw),
        point(sector.min_latitude, mid.longitude),
        point(sector.max_latitude, mid.longitude),
        point(mid.latitude, sector.min_longitude),
        point(mid.latitude, sector.max_longitude),
        at(mid),
    ]
}

/// Bounding sphere of a sector between two altitudes.
#[must_use]
pub fn bounding_sphere(globe: &Globe, sector: &Sector, min_altitude: f64, max_altitude: f64) -> (DVec3, f64) {
    let mid = sector.centroid();
    let center = globe.geodetic_to_cartesian(
        mid.latitude,
        mid.longitude,
        0.5 * (min_altitude + max_altitude),
    );
    let radius = sector_points(globe, sector, min_altitude)
        .into_iter()
        .chain(sector_points(globe, sector, max_altitude))
        .map(|p| p.distance(center))
        .fold(0.0, f64::max);
    (center, radius)
}

/// Shortest distance from `eye` to the sample points of a sector.
#[must_use]
pub fn nearest_distance(globe: &Globe, sector: &Sector, altitude: f64, eye: DVec3) -> f64 {
    sector_points(globe, sector, altitude)
        .into_iter()
        .map(|p| p.distance(eye))
        .fold(f64::INFINITY, f64::min)
}
