//! Exclusion-surface synthesis and coverage culling.

use std::collections::BTreeMap;

use geo::{BoundingRect, Intersects, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{ErasePolygon, GeometryOps, LayerFeature, SelectQuery, Sfid};

use crate::consolidate::{clean_features, coalesce};

/// Percentage of a protected feature's area an exclusion may cover before
/// the exclusion is carved back out around that feature.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoveragePercent(f64);

impl CoveragePercent {
    /// Sentinel that disables culling: no summed coverage can exceed 100 %.
    pub const NEVER: CoveragePercent = CoveragePercent(101.0);

    /// Creates a threshold, rejecting negative and non-finite values.
    pub fn new(percent: f64) -> Result<Self, SiteError> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(SiteError::Config(
                ErrorInfo::new("coverage_percent", "coverage threshold must be a finite percentage")
                    .with_context("percent", percent),
            ));
        }
        Ok(Self(percent))
    }

    pub(crate) const fn preset(percent: f64) -> Self {
        Self(percent)
    }

    /// Raw percentage value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether the threshold lies beyond 100 % and culling is switched off.
    pub fn disables_culling(&self) -> bool {
        self.0 > 100.0
    }
}

/// Feature whose area must not be swallowed by exclusions.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedFeature {
    /// Identifier of the protected evidence feature or buffer block.
    pub id: Sfid,
    /// Protected geometry.
    pub shape: Polygon<f64>,
}

/// One row of the overlap tabulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    /// Protected feature identifier.
    pub protected: Sfid,
    /// Index of the erase polygon in the input collection.
    pub erase_id: usize,
    /// Percentage of the protected feature covered by the erase polygon.
    pub percent: f64,
}

/// Result of [`cull_erase_feats`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CullOutcome {
    /// Erase polygons after carving out heavily covered protected features.
    pub erase: Vec<ErasePolygon>,
    /// Full overlap tabulation.
    pub coverage: Vec<CoverageRow>,
    /// Protected features whose summed coverage met the threshold.
    pub protected: Vec<Sfid>,
}

impl CullOutcome {
    /// Summed coverage per protected feature.
    pub fn summed(&self) -> BTreeMap<Sfid, f64> {
        let mut totals = BTreeMap::new();
        for row in &self.coverage {
            *totals.entry(row.protected.clone()).or_insert(0.0) += row.percent;
        }
        totals
    }

    /// Largest single-polygon coverage recorded per erase polygon.
    pub fn max_by_erase(&self) -> BTreeMap<usize, f64> {
        let mut maxima: BTreeMap<usize, f64> = BTreeMap::new();
        for row in &self.coverage {
            let entry = maxima.entry(row.erase_id).or_insert(0.0);
            *entry = entry.max(row.percent);
        }
        maxima
    }
}

/// Converts a raw exclusion layer into erase polygons.
///
/// Selected features are opened by `elimination_distance` (parts narrower
/// than twice the distance disappear) and closed again by the same distance
/// so surviving features regain their extent. An optional `mask` is then
/// subtracted from the result.
pub fn get_erase_feats(
    ops: &dyn GeometryOps,
    source: &[LayerFeature],
    query: &SelectQuery,
    elimination_distance: f64,
    mask: Option<&[Polygon<f64>]>,
) -> Result<Vec<Polygon<f64>>, SiteError> {
    let selected: Vec<Polygon<f64>> = query
        .select(source)
        .into_iter()
        .map(|feature| feature.shape.clone())
        .collect();
    if selected.is_empty() {
        return Ok(Vec::new());
    }
    let eroded = coalesce(ops, &selected, -elimination_distance)?;
    if eroded.is_empty() {
        debug!(selected = selected.len(), "all exclusion features narrower than the elimination width");
        return Ok(Vec::new());
    }
    let restored = MultiPolygon::new(coalesce(ops, &eroded, elimination_distance)?);
    let result = match mask {
        Some(mask) if !mask.is_empty() => {
            let carved = ops.erase(&restored, &ops.union(mask)?)?;
            clean_features(ops, &carved)
        }
        _ => clean_features(ops, &restored),
    };
    debug!(
        selected = selected.len(),
        erase = result.len(),
        elimination_distance,
        "erase features synthesised"
    );
    Ok(result)
}

/// Carves exclusions back out around protected features they cover too much of.
///
/// Every erase polygon is identified by its position in `erase`. The
/// percentage of each protected feature covered by each erase polygon is
/// tabulated and summed per protected feature; protected features at or
/// above `threshold` are subtracted from every erase polygon. A threshold
/// above 100 % returns the input untouched.
pub fn cull_erase_feats(
    ops: &dyn GeometryOps,
    erase: &[ErasePolygon],
    protected: &[ProtectedFeature],
    threshold: CoveragePercent,
) -> Result<CullOutcome, SiteError> {
    if threshold.disables_culling() || erase.is_empty() || protected.is_empty() {
        return Ok(CullOutcome {
            erase: erase.to_vec(),
            ..CullOutcome::default()
        });
    }

    let boxes: Vec<_> = erase.iter().map(|candidate| candidate.shape.bounding_rect()).collect();
    let mut coverage = Vec::new();
    for feature in protected {
        let Some(extent) = feature.shape.bounding_rect() else {
            continue;
        };
        for (erase_id, candidate) in erase.iter().enumerate() {
            if !boxes[erase_id].is_some_and(|bounds| bounds.intersects(&extent)) {
                continue;
            }
            let percent = ops.overlap_percent(&feature.shape, &candidate.shape)?;
            if percent > 0.0 {
                coverage.push(CoverageRow {
                    protected: feature.id.clone(),
                    erase_id,
                    percent,
                });
            }
        }
    }
    let mut outcome = CullOutcome {
        erase: Vec::new(),
        coverage,
        protected: Vec::new(),
    };

    let totals = outcome.summed();
    let mut heavy = Vec::new();
    for feature in protected {
        let total = totals.get(&feature.id).copied().unwrap_or(0.0);
        if total >= threshold.value() {
            outcome.protected.push(feature.id.clone());
            heavy.push(feature.shape.clone());
        }
    }
    if heavy.is_empty() {
        outcome.erase = erase.to_vec();
        return Ok(outcome);
    }

    let keep_out = ops.union(&heavy)?;
    for candidate in erase {
        let carved = ops.erase(&MultiPolygon::new(vec![candidate.shape.clone()]), &keep_out)?;
        outcome
            .erase
            .extend(clean_features(ops, &carved).into_iter().map(|shape| ErasePolygon {
                source: candidate.source,
                shape,
            }));
    }
    info!(
        protected = outcome.protected.len(),
        threshold = threshold.value(),
        before = erase.len(),
        after = outcome.erase.len(),
        "erase features culled around protected features"
    );
    Ok(outcome)
}
