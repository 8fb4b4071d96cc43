#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use consite_core::{Footprint, GeometryOps, PartThreshold, SiteError};
use consite_geom::PlanarKernel;
use geo::{BoundingRect, MultiPolygon, Polygon};

/// Planar kernel wrapper that can inject faults and counts selected calls.
#[derive(Default)]
pub struct HookedKernel {
    inner: PlanarKernel,
    /// Intersections whose left operand lies east of `x` fail; `true` makes
    /// the failure a configuration error.
    fail_east_of: Option<(f64, bool)>,
    union_delay: Option<Duration>,
    explode_fails: bool,
    overlap_calls: AtomicUsize,
    repair_calls: AtomicUsize,
}

impl HookedKernel {
    pub fn failing_east_of(x: f64, fatal: bool) -> Self {
        Self {
            fail_east_of: Some((x, fatal)),
            ..Self::default()
        }
    }

    pub fn slow_union(delay: Duration) -> Self {
        Self {
            union_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn unexplodable() -> Self {
        Self {
            explode_fails: true,
            ..Self::default()
        }
    }

    pub fn overlap_calls(&self) -> usize {
        self.overlap_calls.load(Ordering::SeqCst)
    }

    pub fn repair_calls(&self) -> usize {
        self.repair_calls.load(Ordering::SeqCst)
    }
}

impl GeometryOps for HookedKernel {
    fn buffer(&self, shapes: &[Polygon<f64>], distance: f64, dissolve_all: bool) -> Result<Vec<Polygon<f64>>, SiteError> {
        self.inner.buffer(shapes, distance, dissolve_all)
    }

    fn buffer_footprint(&self, shape: &Footprint, distance: f64) -> Result<MultiPolygon<f64>, SiteError> {
        self.inner.buffer_footprint(shape, distance)
    }

    fn union(&self, shapes: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, SiteError> {
        if let Some(delay) = self.union_delay {
            thread::sleep(delay);
        }
        self.inner.union(shapes)
    }

    fn intersect(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, SiteError> {
        if let Some((limit, fatal)) = self.fail_east_of {
            if a.bounding_rect().map_or(false, |rect| rect.min().x > limit) {
                return Err(if fatal {
                    SiteError::config("injected", "injected configuration fault")
                } else {
                    SiteError::geometry("injected", "injected kernel fault")
                });
            }
        }
        self.inner.intersect(a, b)
    }

    fn erase(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, SiteError> {
        self.inner.erase(a, b)
    }

    fn explode(&self, shape: &MultiPolygon<f64>) -> Result<Vec<Polygon<f64>>, SiteError> {
        if self.explode_fails {
            return Err(SiteError::geometry("explode_degenerate_part", "injected explode fault"));
        }
        self.inner.explode(shape)
    }

    fn repair(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, SiteError> {
        self.repair_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.repair(shape)
    }

    fn eliminate_parts(&self, shape: &MultiPolygon<f64>, threshold: PartThreshold, contained_only: bool) -> MultiPolygon<f64> {
        self.inner.eliminate_parts(shape, threshold, contained_only)
    }

    fn nearest_distance(&self, shape: &Polygon<f64>, others: &[Footprint]) -> Option<f64> {
        self.inner.nearest_distance(shape, others)
    }

    fn overlap_percent(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> Result<f64, SiteError> {
        self.overlap_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.overlap_percent(a, b)
    }

    fn simplify(&self, shape: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
        self.inner.simplify(shape, tolerance)
    }

    fn area(&self, shape: &MultiPolygon<f64>) -> f64 {
        self.inner.area(shape)
    }

    fn intersects(&self, shape: &Polygon<f64>, other: &Footprint) -> bool {
        self.inner.intersects(shape, other)
    }
}
