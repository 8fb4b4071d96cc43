use geo::{MultiPolygon, Polygon};
use tracing::debug;

use consite_core::errors::SiteError;
use consite_core::{BufferBlock, Footprint, GeometryOps, PartThreshold};

use crate::consolidate::{clean_features, shrink_wrap, WrapOpts};
use crate::fragments::cull_frags;

/// Parts of a carved buffer block smaller than this percentage of the
/// block's pre-erase area are discarded.
pub const CHOP_SLIVER_PERCENT: f64 = 5.0;

/// Default re-stitching distance for [`chop_sbbs`].
pub const DEFAULT_CHOP_DISTANCE: f64 = 5.0;

/// Result of carving buffer blocks with exclusions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChopOutcome {
    /// Carved buffer-block fragments, still keyed by their evidence feature.
    pub fragments: Vec<BufferBlock>,
    /// Shrink-wrapped fragment clusters touching at least one reference feature.
    pub clusters: Vec<Polygon<f64>>,
    /// Exclusions with the clusters removed.
    pub erase: Vec<Polygon<f64>>,
}

/// Carves buffer blocks with exclusions without shattering them into slivers.
///
/// Each block loses the exclusion area; parts below [`CHOP_SLIVER_PERCENT`]
/// of the original block are dropped. The remaining fragments are
/// shrink-wrapped at `distance`, so fragments within `2 * distance` of each
/// other rejoin, and clusters not touching a reference feature are culled.
/// The exclusions are finally reduced to what lies outside the clusters.
pub fn chop_sbbs(
    ops: &dyn GeometryOps,
    reference: &[Footprint],
    blocks: &[BufferBlock],
    erase: &[Polygon<f64>],
    distance: f64,
    wrap: &WrapOpts,
) -> Result<ChopOutcome, SiteError> {
    let mask = ops.union(erase)?;
    let mut fragments = Vec::new();
    for block in blocks {
        let original = MultiPolygon::new(vec![block.shape.clone()]);
        let before = ops.area(&original);
        let carved = ops.erase(&original, &mask)?;
        if carved.0.is_empty() {
            continue;
        }
        let threshold = PartThreshold::Area(before * CHOP_SLIVER_PERCENT / 100.0);
        let kept = ops.eliminate_parts(&carved, threshold, false);
        fragments.extend(clean_features(ops, &kept).into_iter().map(|shape| BufferBlock {
            sfid: block.sfid.clone(),
            shape,
        }));
    }

    let shapes: Vec<Polygon<f64>> = fragments.iter().map(|f| f.shape.clone()).collect();
    let wraps = shrink_wrap(ops, &shapes, distance, wrap)?;
    let wrapped: Vec<Polygon<f64>> = wraps
        .iter()
        .flat_map(|wrap| clean_features(ops, wrap))
        .collect();
    let clusters = cull_frags(ops, &wrapped, reference, 0.0)?;

    let refined = if clusters.is_empty() || erase.is_empty() {
        erase.to_vec()
    } else {
        let cover = ops.union(&clusters)?;
        let mut refined = Vec::new();
        for shape in erase {
            let carved = ops.erase(&MultiPolygon::new(vec![shape.clone()]), &cover)?;
            refined.extend(clean_features(ops, &carved));
        }
        refined
    };
    debug!(
        blocks = blocks.len(),
        fragments = fragments.len(),
        clusters = clusters.len(),
        erase = refined.len(),
        "buffer blocks chopped"
    );
    Ok(ChopOutcome {
        fragments,
        clusters,
        erase: refined,
    })
}
