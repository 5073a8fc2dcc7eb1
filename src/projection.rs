//! Spherical-Mercator placement of stations on a web map.

use crate::error::{AppError, Result};
use serde::Serialize;
use std::f64::consts::PI;

/// Earth major radius in metres.
pub const EARTH_MAJOR_RADIUS_M: f64 = 6378137.0;

/// Planar map coordinates in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

/// Projects latitude/longitude (degrees) onto spherical-Mercator x/y.
///
/// `x = R·radians(lon)` and `y = (180/π)·ln(tan(π/4 + radians(lat)/2))·s` where
/// the scale `s = x/lon` is the constant `R·radians(1)`. Computing `s` directly
/// keeps `lon = 0` well defined (`x = 0`).
///
/// # Errors
///
/// Returns `AppError::Projection` for non-finite input or |lat| ≥ 90°.
pub fn project(lat: f64, lon: f64) -> Result<MapPoint> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(AppError::Projection(format!(
            "non-finite coordinates ({}, {})",
            lat, lon
        )));
    }
    if lat.abs() >= 90.0 {
        return Err(AppError::Projection(format!(
            "latitude {} outside the Mercator domain",
            lat
        )));
    }

    let x = EARTH_MAJOR_RADIUS_M * lon.to_radians();
    let scale = EARTH_MAJOR_RADIUS_M * 1f64.to_radians();
    let y = 180.0 / PI * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * scale;
    Ok(MapPoint { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_is_pure() {
        let first = project(47.26, 11.384).unwrap();
        let second = project(47.26, 11.384).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_project_matches_web_mercator() {
        let point = project(47.26, 11.384).unwrap();
        let expected_x = EARTH_MAJOR_RADIUS_M * 11.384_f64.to_radians();
        let expected_y =
            EARTH_MAJOR_RADIUS_M * (PI / 4.0 + 47.26_f64.to_radians() / 2.0).tan().ln();
        assert!((point.x - expected_x).abs() < 1e-6);
        assert!((point.y - expected_y).abs() < 1e-3);
        // Innsbruck lies within the default dashboard map extent.
        assert!(point.x > 1_108_137.0 && point.x < 1_417_582.0);
        assert!(point.y > 5_895_123.0 && point.y < 6_088_551.0);
    }

    #[test]
    fn test_zero_longitude_is_special_cased() {
        let point = project(47.26, 0.0).unwrap();
        assert_eq!(point.x, 0.0);
        assert_eq!(point.y, project(47.26, 11.384).unwrap().y);
    }

    #[test]
    fn test_rejects_poles_and_nan() {
        assert!(matches!(project(90.0, 10.0), Err(AppError::Projection(_))));
        assert!(matches!(project(f64::NAN, 10.0), Err(AppError::Projection(_))));
    }
}
