//! Evidence selection, buffer blocks and proto-sites.

use std::collections::BTreeSet;

use geo::{BoundingRect, MultiPolygon, Polygon};
use tracing::{debug, info};

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{BufferBlock, EvidenceFeature, Footprint, GeometryOps, ProtoSite, ProtoSiteId, Sfid};

use crate::consolidate::{clean_features, shrink_wrap, WrapOpts};

/// Builds one buffer block per evidence feature.
///
/// A zero buffer distance yields a repaired copy of a polygon feature and is
/// rejected for points and lines, which have no area to copy. A feature whose
/// buffer falls apart into several parts yields one block per part, all
/// sharing the feature's identifier.
pub fn build_buffer_blocks(
    ops: &dyn GeometryOps,
    evidence: &[EvidenceFeature],
) -> Result<Vec<BufferBlock>, SiteError> {
    let mut blocks = Vec::with_capacity(evidence.len());
    for feature in evidence {
        let distance = feature.buffer_distance;
        if !distance.is_finite() || distance < 0.0 {
            return Err(SiteError::Config(
                ErrorInfo::new("buffer_distance", "buffer distance must be finite and >= 0")
                    .with_context("sfid", &feature.sfid)
                    .with_context("distance", distance),
            ));
        }
        let shape = match (&feature.shape, distance == 0.0) {
            (Footprint::Area(polygon), true) => MultiPolygon::new(vec![polygon.clone()]),
            (_, true) => {
                return Err(SiteError::Config(
                    ErrorInfo::new(
                        "zero_buffer_non_areal",
                        "point and line evidence needs a positive buffer distance",
                    )
                    .with_context("sfid", &feature.sfid)
                    .with_context("rule", &feature.rule),
                ))
            }
            (footprint, false) => ops.buffer_footprint(footprint, distance)?,
        };
        let parts = clean_features(ops, &shape);
        if parts.is_empty() {
            debug!(sfid = %feature.sfid, "buffer block came back empty");
        }
        blocks.extend(parts.into_iter().map(|shape| BufferBlock {
            sfid: feature.sfid.clone(),
            shape,
        }));
    }
    debug!(evidence = evidence.len(), blocks = blocks.len(), "buffer blocks built");
    Ok(blocks)
}

/// Consolidates buffer blocks into proto-sites.
///
/// Blocks are shrink-wrapped at `distance` and the wraps are exploded into
/// connected components. Ids follow the lower-left corner of each component
/// so the numbering does not depend on input order.
pub fn build_proto_sites(
    ops: &dyn GeometryOps,
    blocks: &[BufferBlock],
    distance: f64,
    wrap: &WrapOpts,
) -> Result<Vec<ProtoSite>, SiteError> {
    let shapes: Vec<Polygon<f64>> = blocks.iter().map(|block| block.shape.clone()).collect();
    let wraps = shrink_wrap(ops, &shapes, distance, wrap)?;
    let mut parts: Vec<Polygon<f64>> = wraps
        .iter()
        .flat_map(|wrap| clean_features(ops, wrap))
        .collect();
    parts.sort_by(|a, b| corner(a).partial_cmp(&corner(b)).unwrap_or(std::cmp::Ordering::Equal));
    let sites: Vec<ProtoSite> = parts
        .into_iter()
        .enumerate()
        .map(|(index, shape)| ProtoSite {
            id: ProtoSiteId::from_raw(index as u64),
            shape,
        })
        .collect();
    info!(blocks = blocks.len(), proto_sites = sites.len(), distance, "proto-sites built");
    Ok(sites)
}

fn corner(shape: &Polygon<f64>) -> (f64, f64) {
    shape
        .bounding_rect()
        .map(|rect| (rect.min().x, rect.min().y))
        .unwrap_or((f64::INFINITY, f64::INFINITY))
}

/// Grows a selection of evidence features to their neighbours.
///
/// Starting from `seeds`, every feature within `distance` of a newly added
/// feature joins the selection until nothing more is reachable. Seeds that
/// do not name an evidence feature are ignored. The result follows the
/// order of `evidence`.
pub fn expand_selection(
    ops: &dyn GeometryOps,
    evidence: &[EvidenceFeature],
    seeds: &[Sfid],
    distance: f64,
) -> Result<Vec<Sfid>, SiteError> {
    if !distance.is_finite() || distance <= 0.0 {
        return Err(SiteError::Config(
            ErrorInfo::new("selection_distance", "selection distance must be positive")
                .with_context("distance", distance),
        ));
    }
    let mut selected: BTreeSet<Sfid> = seeds
        .iter()
        .filter(|sfid| evidence.iter().any(|feature| &feature.sfid == *sfid))
        .cloned()
        .collect();
    let mut frontier: Vec<&EvidenceFeature> = evidence
        .iter()
        .filter(|feature| selected.contains(&feature.sfid))
        .collect();

    let mut rounds = 0usize;
    while !frontier.is_empty() {
        rounds += 1;
        let mut reach = Vec::new();
        for feature in &frontier {
            reach.extend(ops.buffer_footprint(&feature.shape, distance)?.0);
        }
        let mut added = Vec::new();
        for feature in evidence {
            if selected.contains(&feature.sfid) {
                continue;
            }
            if reach.iter().any(|zone| ops.intersects(zone, &feature.shape)) {
                added.push(feature);
            }
        }
        for feature in &added {
            selected.insert(feature.sfid.clone());
        }
        frontier = added;
    }
    debug!(seeds = seeds.len(), selected = selected.len(), rounds, "selection expanded");
    Ok(evidence
        .iter()
        .filter(|feature| selected.contains(&feature.sfid))
        .map(|feature| feature.sfid.clone())
        .collect())
}
