#![deny(missing_docs)]
#![doc = "Core data model, geometry kernel contract and errors for conservation site delineation."]

use std::fmt;

use geo::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
pub mod query;
mod types;

pub use errors::{ErrorInfo, SiteError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use query::SelectQuery;
pub use types::{
    AttrValue, BufferBlock, ConSite, EraseSource, ErasePolygon, EvidenceFeature, FieldDef,
    Footprint, LayerFeature, ProtoSite, SiteTemplate, SiteType, SplitSite,
};

/// Source feature identifier shared by an evidence feature and its buffer block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sfid(String);

impl Sfid {
    /// Creates an identifier from its textual form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the textual form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a proto-site within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtoSiteId(u64);

impl ProtoSiteId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProtoSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a committed conservation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(u64);

impl SiteId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Size threshold used when eliminating polygon parts or interior gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartThreshold {
    /// Absolute area in squared map units.
    Area(f64),
    /// Percentage of the feature's total outer area.
    Percent(f64),
}

impl PartThreshold {
    /// Resolves the threshold to an absolute area for a feature of `outer_area`.
    pub fn resolve(&self, outer_area: f64) -> f64 {
        match self {
            PartThreshold::Area(area) => *area,
            PartThreshold::Percent(pct) => outer_area * pct / 100.0,
        }
    }
}

/// Planar geometry capabilities the delineation pipeline relies on.
///
/// Implementations are expected to be correct for valid input; the pipeline
/// repairs and explodes intermediate results before feeding them back in.
/// All operations are synchronous.
pub trait GeometryOps: Send + Sync {
    /// Buffers each shape by `distance` (negative shrinks). With
    /// `dissolve_all` the buffers are unioned before being returned.
    fn buffer(
        &self,
        shapes: &[Polygon<f64>],
        distance: f64,
        dissolve_all: bool,
    ) -> Result<Vec<Polygon<f64>>, SiteError>;

    /// Buffers a point, line or polygon footprint.
    fn buffer_footprint(
        &self,
        shape: &Footprint,
        distance: f64,
    ) -> Result<MultiPolygon<f64>, SiteError>;

    /// Unions all shapes into a single (possibly multi-part) geometry.
    fn union(&self, shapes: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, SiteError>;

    /// Dissolves shapes into non-overlapping single-part polygons.
    fn dissolve(&self, shapes: &[Polygon<f64>]) -> Result<Vec<Polygon<f64>>, SiteError> {
        let merged = self.union(shapes)?;
        self.explode(&merged)
    }

    /// Boolean intersection.
    fn intersect(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, SiteError>;

    /// Boolean difference `a - b`.
    fn erase(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, SiteError>;

    /// Clips `shape` to `bound`.
    fn clip(
        &self,
        shape: &Polygon<f64>,
        bound: &Polygon<f64>,
    ) -> Result<MultiPolygon<f64>, SiteError> {
        self.intersect(
            &MultiPolygon::new(vec![shape.clone()]),
            &MultiPolygon::new(vec![bound.clone()]),
        )
    }

    /// Splits a multi-part geometry into single-part polygons. Fails when a
    /// part is degenerate.
    fn explode(&self, shape: &MultiPolygon<f64>) -> Result<Vec<Polygon<f64>>, SiteError>;

    /// Resolves self-intersections and drops degenerate rings.
    fn repair(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, SiteError>;

    /// Fills interior gaps below `threshold`; unless `contained_only`, also
    /// drops exterior parts below `threshold`. The largest part always survives.
    fn eliminate_parts(
        &self,
        shape: &MultiPolygon<f64>,
        threshold: PartThreshold,
        contained_only: bool,
    ) -> MultiPolygon<f64>;

    /// Distance from `shape` to the nearest footprint, `None` when `others` is empty.
    fn nearest_distance(&self, shape: &Polygon<f64>, others: &[Footprint]) -> Option<f64>;

    /// Percentage of `a`'s area covered by `b`.
    fn overlap_percent(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> Result<f64, SiteError>;

    /// Douglas-Peucker simplification.
    fn simplify(&self, shape: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64>;

    /// Unsigned area.
    fn area(&self, shape: &MultiPolygon<f64>) -> f64;

    /// Whether a polygon intersects (or touches) a footprint.
    fn intersects(&self, shape: &Polygon<f64>, other: &Footprint) -> bool;
}
