//! Geographic primitives used by grid generation and entity matching.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in miles, per the standard haversine formulation.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Miles per degree of latitude (constant across the globe).
pub const MILES_PER_DEGREE_LAT: f64 = 69.0;

/// A single geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
}

impl GeoPoint {
    /// Create a point from decimal-degree coordinates.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance between two coordinates in miles.
#[must_use]
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint::new(26.4615, -80.0728);
        assert!(haversine_miles(p, p) < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Boca Raton to Fort Lauderdale is roughly 20 miles
        let boca = GeoPoint::new(26.3683, -80.1289);
        let ftl = GeoPoint::new(26.1224, -80.1373);
        let d = haversine_miles(boca, ftl);
        assert!(d > 15.0 && d < 20.0, "unexpected distance {d}");
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = GeoPoint::new(26.4615, -80.0728);
        let b = GeoPoint::new(26.4700, -80.0800);
        let ab = haversine_miles(a, b);
        let ba = haversine_miles(b, a);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_fifty_meters() {
        // ~50 m north of a point; 0.031 mi is the matcher's coincidence radius
        let a = GeoPoint::new(26.4615, -80.0728);
        let b = GeoPoint::new(26.4615 + 0.00045, -80.0728);
        let d = haversine_miles(a, b);
        assert!(d > 0.025 && d < 0.036, "unexpected distance {d}");
    }
}
