//! Shape builders and ring inspection helpers.

use std::f64::consts::PI;

use geo::{coord, Area, Coord, LineString, MultiPolygon, Polygon, Rect};

/// Regular polygon approximating a circle.
pub fn circle(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let segments = segments.max(8);
    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|step| {
            let angle = 2.0 * PI * step as f64 / segments as f64;
            coord! {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::new(ring), vec![])
}

/// Axis-aligned rectangle between two corners.
pub fn rectangle(min: Coord<f64>, max: Coord<f64>) -> Polygon<f64> {
    Rect::new(min, max).to_polygon()
}

/// Area enclosed by the exterior ring only, ignoring holes.
pub fn outer_area(polygon: &Polygon<f64>) -> f64 {
    Polygon::new(polygon.exterior().clone(), vec![]).unsigned_area()
}

/// Area enclosed by a ring.
pub fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).unsigned_area()
}

/// Sum of the outer areas of all parts.
pub fn total_outer_area(shape: &MultiPolygon<f64>) -> f64 {
    shape.iter().map(outer_area).sum()
}

/// Whether every coordinate of every ring is finite and each ring has at
/// least `min_coords` coordinates.
pub fn rings_well_formed(polygon: &Polygon<f64>, min_coords: usize) -> bool {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .all(|ring| {
            ring.0.len() >= min_coords
                && ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
        })
}

/// Wraps polygons in a multi-polygon.
pub fn multi(parts: impl IntoIterator<Item = Polygon<f64>>) -> MultiPolygon<f64> {
    MultiPolygon::new(parts.into_iter().collect())
}
