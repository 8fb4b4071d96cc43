//! Morphological consolidation primitives.
//!
//! [`coalesce`] is a closing (positive distance) or opening (negative
//! distance) built from two buffers. [`shrink_wrap`] groups features into
//! spatial clusters and wraps each cluster in a smooth envelope.

use geo::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{Footprint, GeometryOps, PartThreshold};

/// Interior gaps smaller than this area (squared map units) are filled
/// between the two buffers of [`coalesce`].
pub const COALESCE_GAP_AREA: f64 = 900.0;

/// Number of repair passes attempted before [`clean_features`] gives up.
pub const MAX_EXPLODE_ATTEMPTS: usize = 10;

/// Gaps smaller than this percentage of a wrap's outer area are filled.
pub const WRAP_GAP_PERCENT: f64 = 99.0;

/// Tuning knobs for [`shrink_wrap`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WrapOpts {
    /// Factor applied to the cluster distance for the smoothing coalesce.
    pub smoothing_multiplier: f64,
    /// Vertex simplification tolerance applied to the dissolved input.
    pub simplify_tolerance: f64,
}

impl Default for WrapOpts {
    fn default() -> Self {
        Self {
            smoothing_multiplier: 8.0,
            simplify_tolerance: 0.1,
        }
    }
}

fn multi(parts: &[Polygon<f64>]) -> MultiPolygon<f64> {
    MultiPolygon::new(parts.to_vec())
}

/// Repairs and explodes a geometry into simple single-part polygons.
///
/// Explosion is retried after a repair pass up to [`MAX_EXPLODE_ATTEMPTS`]
/// times. When every attempt fails the input parts are returned unmodified.
pub fn clean_features(ops: &dyn GeometryOps, shape: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    let mut current = shape.clone();
    for attempt in 1..=MAX_EXPLODE_ATTEMPTS {
        let repaired = match ops.repair(&current) {
            Ok(repaired) => repaired,
            Err(err) => {
                debug!(attempt, error = %err, "repair pass failed");
                continue;
            }
        };
        match ops.explode(&repaired) {
            Ok(parts) => return parts,
            Err(err) => {
                debug!(attempt, error = %err, "explode failed, retrying after repair");
                current = repaired;
            }
        }
    }
    warn!(
        parts = shape.0.len(),
        attempts = MAX_EXPLODE_ATTEMPTS,
        "geometry could not be repaired; keeping input unmodified"
    );
    shape.0.clone()
}

/// Cleans every polygon independently so overlapping inputs stay separate.
pub fn clean_each(ops: &dyn GeometryOps, shapes: &[Polygon<f64>]) -> Vec<Polygon<f64>> {
    shapes
        .iter()
        .flat_map(|shape| clean_features(ops, &MultiPolygon::new(vec![shape.clone()])))
        .collect()
}

/// Morphological closing (`distance > 0`) or opening (`distance < 0`).
///
/// A closing dissolves the grown buffers before shrinking them back, merging
/// features closer than `2 * distance`. An opening shrinks each feature on
/// its own and dissolves on the way back out, removing parts narrower than
/// `2 * |distance|`. Features that vanish while shrinking are dropped.
///
/// Arc approximation makes the restoring buffer fall slightly short, so a
/// closing is unioned with its input and an opening is clipped to it. The
/// result of a closing always covers `features`; an opening never exceeds them.
pub fn coalesce(
    ops: &dyn GeometryOps,
    features: &[Polygon<f64>],
    distance: f64,
) -> Result<Vec<Polygon<f64>>, SiteError> {
    if distance == 0.0 || !distance.is_finite() {
        return Err(SiteError::Config(
            ErrorInfo::new("coalesce_zero_distance", "coalesce distance must be non-zero")
                .with_context("distance", distance),
        ));
    }
    if features.is_empty() {
        return Ok(Vec::new());
    }
    let closing = distance > 0.0;

    let grown = ops.buffer(features, distance, closing)?;
    let grown = if closing {
        clean_features(ops, &multi(&grown))
    } else {
        clean_each(ops, &grown)
    };
    if grown.is_empty() {
        return Ok(Vec::new());
    }

    let filled: Vec<Polygon<f64>> = grown
        .iter()
        .flat_map(|part| {
            ops.eliminate_parts(
                &MultiPolygon::new(vec![part.clone()]),
                PartThreshold::Area(COALESCE_GAP_AREA),
                true,
            )
            .0
        })
        .collect();

    let mut restored = ops.buffer(&filled, -distance, !closing)?;
    let result = if closing {
        restored.extend_from_slice(features);
        clean_features(ops, &ops.union(&restored)?)
    } else {
        let opened = ops.intersect(&multi(&restored), &ops.union(features)?)?;
        clean_features(ops, &opened)
    };
    debug!(
        inputs = features.len(),
        outputs = result.len(),
        distance,
        "coalesce"
    );
    Ok(result)
}

/// Wraps each spatial cluster of `features` in a smooth envelope.
///
/// Clusters are the connected components of the dissolved input grown by
/// `distance`. Each cluster's members are closed with
/// `distance * smoothing_multiplier` and stripped of interior gaps. A cluster
/// whose wrap fails is logged and kept as its unsmoothed members; the other
/// clusters are unaffected.
pub fn shrink_wrap(
    ops: &dyn GeometryOps,
    features: &[Polygon<f64>],
    distance: f64,
    opts: &WrapOpts,
) -> Result<Vec<MultiPolygon<f64>>, SiteError> {
    if distance <= 0.0 || !distance.is_finite() {
        return Err(SiteError::Config(
            ErrorInfo::new("shrink_wrap_distance", "shrink-wrap distance must be positive")
                .with_context("distance", distance),
        ));
    }
    if opts.smoothing_multiplier <= 0.0 {
        return Err(SiteError::Config(
            ErrorInfo::new("shrink_wrap_multiplier", "smoothing multiplier must be positive")
                .with_context("multiplier", opts.smoothing_multiplier),
        ));
    }
    if features.is_empty() {
        return Ok(Vec::new());
    }

    let dissolved = clean_features(ops, &ops.union(features)?);
    let simplified: Vec<Polygon<f64>> = dissolved
        .iter()
        .flat_map(|part| {
            let thinned = ops.simplify(
                &MultiPolygon::new(vec![part.clone()]),
                opts.simplify_tolerance,
            );
            clean_features(ops, &thinned)
        })
        .collect();
    let members: Vec<Footprint> = simplified.iter().cloned().map(Footprint::Area).collect();

    let candidates = clean_features(ops, &multi(&ops.buffer(&simplified, distance, true)?));
    let smoothing = distance * opts.smoothing_multiplier;

    let mut wraps = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let cluster: Vec<Polygon<f64>> = simplified
            .iter()
            .zip(members.iter())
            .filter(|(_, footprint)| ops.intersects(candidate, footprint))
            .map(|(shape, _)| shape.clone())
            .collect();
        if cluster.is_empty() {
            continue;
        }
        match wrap_cluster(ops, &cluster, smoothing) {
            Ok(wrap) if !wrap.0.is_empty() => wraps.push(wrap),
            Ok(_) => {
                warn!(cluster = index, "cluster wrap came back empty; keeping members");
                wraps.push(multi(&cluster));
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(cluster = index, error = %err, "cluster wrap failed; keeping members");
                wraps.push(multi(&cluster));
            }
        }
    }
    debug!(
        inputs = features.len(),
        clusters = wraps.len(),
        distance,
        "shrink-wrap"
    );
    Ok(wraps)
}

fn wrap_cluster(
    ops: &dyn GeometryOps,
    cluster: &[Polygon<f64>],
    smoothing: f64,
) -> Result<MultiPolygon<f64>, SiteError> {
    let closed = coalesce(ops, cluster, smoothing)?;
    Ok(ops.eliminate_parts(
        &multi(&closed),
        PartThreshold::Percent(WRAP_GAP_PERCENT),
        true,
    ))
}
