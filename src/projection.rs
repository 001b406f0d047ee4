//! Spherical Web Mercator (EPSG:3857) projection.
//!
//! Degrees are not locally equidistant, so every metric threshold in the
//! pipeline (simplification tolerance in meters, conflict distance) is
//! evaluated on projected coordinates instead.

use geo::{Coord, LineString};

use crate::TrackPoint;

/// WGS84 semi-major axis used by EPSG:3857, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of the projection; beyond it y grows without bound.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Project longitude/latitude degrees to Web Mercator meters.
#[inline]
pub fn to_mercator(longitude: f64, latitude: f64) -> Coord<f64> {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: EARTH_RADIUS * longitude.to_radians(),
        y: EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Project a track into a planar line string.
pub fn project_track(points: &[TrackPoint]) -> LineString<f64> {
    LineString::new(
        points
            .iter()
            .map(|p| to_mercator(p.longitude, p.latitude))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_origin() {
        let c = to_mercator(0.0, 0.0);
        assert!(approx_eq(c.x, 0.0, 1e-9));
        assert!(approx_eq(c.y, 0.0, 1e-9));
    }

    #[test]
    fn test_known_value() {
        // 180°E maps to half the equatorial circumference
        let c = to_mercator(180.0, 0.0);
        assert!(approx_eq(c.x, 20_037_508.342_789_244, 1e-3));
    }

    #[test]
    fn test_meridian_spacing_grows_with_latitude() {
        // One degree of latitude spans more projected meters further north
        let equator = to_mercator(0.0, 1.0).y - to_mercator(0.0, 0.0).y;
        let tatras = to_mercator(0.0, 50.0).y - to_mercator(0.0, 49.0).y;
        assert!(approx_eq(equator, 111_325.0, 10.0));
        assert!(tatras > equator * 1.5);
    }

    #[test]
    fn test_clamps_poles() {
        let c = to_mercator(0.0, 90.0);
        assert!(c.y.is_finite());
    }
}
