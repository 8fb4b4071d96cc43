use geo::Polygon;
use tracing::debug;

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{Footprint, GeometryOps};

use crate::consolidate::clean_each;

/// Keeps fragments lying within `search_distance` of a reference feature.
///
/// The bound is inclusive; a distance of zero requires the fragment to
/// intersect or touch a reference. Fragments with no reference at all are
/// dropped. Survivors are repaired and exploded.
pub fn cull_frags(
    ops: &dyn GeometryOps,
    fragments: &[Polygon<f64>],
    reference: &[Footprint],
    search_distance: f64,
) -> Result<Vec<Polygon<f64>>, SiteError> {
    if !search_distance.is_finite() || search_distance < 0.0 {
        return Err(SiteError::Config(
            ErrorInfo::new("search_distance", "search distance must be finite and >= 0")
                .with_context("distance", search_distance),
        ));
    }
    let survivors: Vec<Polygon<f64>> = fragments
        .iter()
        .filter(|fragment| {
            ops.nearest_distance(fragment, reference)
                .map_or(false, |distance| distance <= search_distance)
        })
        .cloned()
        .collect();
    debug!(
        fragments = fragments.len(),
        survivors = survivors.len(),
        search_distance,
        "fragments culled"
    );
    Ok(clean_each(ops, &survivors))
}
