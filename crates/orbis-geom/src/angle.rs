//! Angle normalization and clamping helpers.
//!
//! All angles are in degrees unless a function name says otherwise.

/// Normalize a heading into `[0, 360)`.
#[must_use]
pub fn normalize_heading(degrees: f64) -> f64 {
    let heading = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.
    if heading >= 360.0 { 0.0 } else { heading }
}

/// Normalize a longitude into `[-180, 180]`.
#[must_use]
pub fn normalize_longitude(degrees: f64) -> f64 {
    let lon = degrees % 360.0;
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Normalize a latitude into `[-90, 90]`, reflecting values that pass over a
/// pole.
#[must_use]
pub fn normalize_latitude(degrees: f64) -> f64 {
    let lat = degrees % 180.0;
    if lat > 90.0 {
        180.0 - lat
    } else if lat < -90.0 {
        -180.0 - lat
    } else {
        lat
    }
}

/// Clamp a latitude into `[-90, 90]`.
#[must_use]
pub fn clamp_latitude(degrees: f64) -> f64 {
    degrees.clamp(-90.0, 90.0)
}

/// Clamp a longitude into `[-180, 180]`.
#[must_use]
pub fn clamp_longitude(degrees: f64) -> f64 {
    degrees.clamp(-180.0, 180.0)
}

/// Smallest signed difference `to - from`, in `(-180, 180]`.
#[must_use]
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let delta = normalize_heading(to - from);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(370.0), 10.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(-1e-20), 0.0);
    }

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(190.0), -170.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(540.0), 180.0);
        assert_eq!(normalize_longitude(-45.0), -45.0);
    }

    #[test]
    fn test_normalize_latitude_reflects_over_pole() {
        assert_eq!(normalize_latitude(100.0), 80.0);
        assert_eq!(normalize_latitude(-100.0), -80.0);
        assert_eq!(normalize_latitude(45.0), 45.0);
    }

    #[test]
    fn test_heading_delta_takes_short_way() {
        assert_eq!(heading_delta(350.0, 10.0), 20.0);
        assert_eq!(heading_delta(10.0, 350.0), -20.0);
        assert_eq!(heading_delta(0.0, 180.0), 180.0);
    }
}
