use geo::algorithm::buffer::{BufferStyle, LineCap, LineJoin};
use geo::{
    unary_union, Area, BooleanOps, Buffer, Distance, Euclidean, Intersects, MultiPolygon,
    Polygon, Simplify,
};
use tracing::trace;

use consite_core::{
    errors::{ErrorInfo, SiteError},
    Footprint, GeometryOps, PartThreshold,
};

use crate::flags::KernelConfig;
use crate::shapes::{outer_area, ring_area, rings_well_formed, total_outer_area};

/// [`GeometryOps`] implementation backed by the `geo` crate's boolean and
/// buffer algorithms.
#[derive(Debug, Clone, Default)]
pub struct PlanarKernel {
    config: KernelConfig,
}

impl PlanarKernel {
    /// Creates a kernel with the provided configuration.
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Round joins and caps at the configured arc resolution.
    fn style(&self, distance: f64) -> BufferStyle<f64> {
        BufferStyle::new(distance)
            .line_join(LineJoin::Round(self.config.arc_step))
            .line_cap(LineCap::Round(self.config.arc_step))
    }

    fn keep_part(&self, polygon: &Polygon<f64>) -> bool {
        polygon.unsigned_area() > self.config.min_part_area
    }
}

fn footprint_intersects(shape: &Polygon<f64>, other: &Footprint) -> bool {
    match other {
        Footprint::Point(point) => shape.intersects(point),
        Footprint::Line(line) => shape.intersects(line),
        Footprint::Area(polygon) => shape.intersects(polygon),
    }
}

fn footprint_distance(shape: &Polygon<f64>, other: &Footprint) -> f64 {
    if footprint_intersects(shape, other) {
        return 0.0;
    }
    match other {
        Footprint::Point(point) => Euclidean.distance(point, shape),
        Footprint::Line(line) => Euclidean.distance(line, shape),
        Footprint::Area(polygon) => Euclidean.distance(polygon, shape),
    }
}

impl GeometryOps for PlanarKernel {
    fn buffer(
        &self,
        shapes: &[Polygon<f64>],
        distance: f64,
        dissolve_all: bool,
    ) -> Result<Vec<Polygon<f64>>, SiteError> {
        if !distance.is_finite() {
            return Err(SiteError::Geometry(
                ErrorInfo::new("buffer_distance", "buffer distance must be finite")
                    .with_context("distance", distance),
            ));
        }
        let mut parts = Vec::new();
        for shape in shapes {
            parts.extend(shape.buffer_with_style(self.style(distance)).0);
        }
        trace!(inputs = shapes.len(), parts = parts.len(), distance, "buffer");
        if dissolve_all {
            Ok(unary_union(parts.iter()).0)
        } else {
            Ok(parts)
        }
    }

    fn buffer_footprint(
        &self,
        shape: &Footprint,
        distance: f64,
    ) -> Result<MultiPolygon<f64>, SiteError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(SiteError::Geometry(
                ErrorInfo::new("buffer_distance", "footprint buffer must be finite and >= 0")
                    .with_context("distance", distance),
            ));
        }
        let style = self.style(distance);
        let buffered = match shape {
            Footprint::Point(point) => point.buffer_with_style(style),
            Footprint::Line(line) => line.buffer_with_style(style),
            Footprint::Area(polygon) => polygon.buffer_with_style(style),
        };
        Ok(buffered)
    }

    fn union(&self, shapes: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, SiteError> {
        Ok(unary_union(shapes.iter()))
    }

    fn intersect(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, SiteError> {
        if a.0.is_empty() || b.0.is_empty() {
            return Ok(MultiPolygon::new(vec![]));
        }
        Ok(a.intersection(b))
    }

    fn erase(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, SiteError> {
        if a.0.is_empty() || b.0.is_empty() {
            return Ok(a.clone());
        }
        Ok(a.difference(b))
    }

    fn explode(&self, shape: &MultiPolygon<f64>) -> Result<Vec<Polygon<f64>>, SiteError> {
        let mut parts = Vec::with_capacity(shape.0.len());
        for (index, polygon) in shape.iter().enumerate() {
            if !rings_well_formed(polygon, self.config.min_ring_coords) {
                return Err(SiteError::Geometry(
                    ErrorInfo::new("explode_degenerate_part", "part has a malformed ring")
                        .with_context("part", index)
                        .with_context("exterior_coords", polygon.exterior().0.len()),
                ));
            }
            if self.keep_part(polygon) {
                parts.push(polygon.clone());
            }
        }
        Ok(parts)
    }

    fn repair(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, SiteError> {
        let sound: Vec<Polygon<f64>> = shape
            .iter()
            .filter(|polygon| rings_well_formed(polygon, self.config.min_ring_coords))
            .cloned()
            .collect();
        let dropped = shape.0.len() - sound.len();
        if dropped > 0 {
            trace!(dropped, "repair dropped malformed parts");
        }
        let merged = unary_union(sound.iter());
        Ok(MultiPolygon::new(
            merged.into_iter().filter(|p| self.keep_part(p)).collect(),
        ))
    }

    fn eliminate_parts(
        &self,
        shape: &MultiPolygon<f64>,
        threshold: PartThreshold,
        contained_only: bool,
    ) -> MultiPolygon<f64> {
        let limit = threshold.resolve(total_outer_area(shape));
        let largest = shape
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| outer_area(a).total_cmp(&outer_area(b)))
            .map(|(index, _)| index);
        let parts = shape
            .iter()
            .enumerate()
            .filter(|(index, polygon)| {
                contained_only || Some(*index) == largest || outer_area(polygon) >= limit
            })
            .map(|(_, polygon)| {
                let holes = polygon
                    .interiors()
                    .iter()
                    .filter(|ring| ring_area(ring) >= limit)
                    .cloned()
                    .collect();
                Polygon::new(polygon.exterior().clone(), holes)
            })
            .collect();
        MultiPolygon::new(parts)
    }

    fn nearest_distance(&self, shape: &Polygon<f64>, others: &[Footprint]) -> Option<f64> {
        others
            .iter()
            .map(|other| footprint_distance(shape, other))
            .min_by(f64::total_cmp)
    }

    fn overlap_percent(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> Result<f64, SiteError> {
        let base = a.unsigned_area();
        if base <= self.config.min_part_area {
            return Err(SiteError::Geometry(
                ErrorInfo::new("overlap_zero_area", "cannot tabulate overlap of an empty polygon")
                    .with_context("area", base),
            ));
        }
        let shared = a.intersection(b).unsigned_area();
        Ok(shared / base * 100.0)
    }

    fn simplify(&self, shape: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
        if tolerance <= 0.0 {
            return shape.clone();
        }
        shape.simplify(tolerance)
    }

    fn area(&self, shape: &MultiPolygon<f64>) -> f64 {
        shape.unsigned_area()
    }

    fn intersects(&self, shape: &Polygon<f64>, other: &Footprint) -> bool {
        footprint_intersects(shape, other)
    }
}
