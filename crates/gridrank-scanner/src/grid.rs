//! Geo-grid generation.
//!
//! Pure arithmetic: a square grid of side `2 * radius` centered on the
//! service area, `grid_size²` points evenly spaced. Row 0 is the north
//! edge and column 0 the west edge. Latitude converts at 69 miles per
//! degree; longitude at `69 * cos(latitude)` miles per degree at the
//! center latitude.

use gridrank_core::MILES_PER_DEGREE_LAT;

/// Grid sizes the orchestrator accepts.
pub const VALID_GRID_SIZES: &[i64] = &[3, 5, 7, 9];

/// One generated grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Row index, 0 = north edge
    pub row: i64,
    /// Column index, 0 = west edge
    pub col: i64,
    /// Latitude, rounded to seven decimals
    pub lat: f64,
    /// Longitude, rounded to seven decimals
    pub lng: f64,
}

/// Generate the `grid_size²` coordinates of a scan grid, row-major from
/// the northwest corner.
///
/// Callers validate `grid_size` against [`VALID_GRID_SIZES`] first; this
/// function assumes `grid_size >= 2`.
#[must_use]
pub fn generate(center_lat: f64, center_lng: f64, radius_miles: f64, grid_size: i64) -> Vec<GridPoint> {
    let steps = (grid_size - 1) as f64;
    let spacing_miles = (2.0 * radius_miles) / steps;

    let miles_per_degree_lng = MILES_PER_DEGREE_LAT * center_lat.to_radians().cos();

    let mut points = Vec::with_capacity((grid_size * grid_size) as usize);
    for row in 0..grid_size {
        // Row 0 sits at the north edge, radius_miles above center
        let north_offset_miles = radius_miles - (row as f64) * spacing_miles;
        let lat = center_lat + north_offset_miles / MILES_PER_DEGREE_LAT;

        for col in 0..grid_size {
            let east_offset_miles = (col as f64) * spacing_miles - radius_miles;
            let lng = center_lng + east_offset_miles / miles_per_degree_lng;

            points.push(GridPoint {
                row,
                col,
                lat: round7(lat),
                lng: round7(lng),
            });
        }
    }

    points
}

fn round7(x: f64) -> f64 {
    (x * 1e7).round() / 1e7
}
