//! Per-proto-site site assembly.
//!
//! A proto-site is carried from its raw consolidated shape to zero or more
//! committed boundaries:
//!
//! 1. `Start` selects member buffer blocks and evidence.
//! 2. `BuildProcessingWindow` grows the proto-site and clips the layers.
//! 3. `SynthesizeExclusions` turns each layer into culled erase polygons.
//! 4. `Chop` carves the buffer blocks.
//! 5. `EraseProtoSite` carves the proto-site into split sites.
//! 6. `PerSplitSite` rebuilds each split site from its block fragments.
//! 7. `Remerge` wraps the split-site results into clusters, one boundary
//!    per cluster.
//! 8. `Commit` credits each boundary with the evidence it satisfies.
//!
//! Every error raised on the way is caught at the unit boundary and turned
//! into a [`FailureReport`]; committing is left to the dispatcher.

use geo::{MultiPolygon, Polygon};
use tracing::{debug, error, info, info_span};

use consite_core::errors::SiteError;
use consite_core::{
    BufferBlock, ErasePolygon, EraseSource, EvidenceFeature, Footprint, GeometryOps,
    LayerFeature, PartThreshold, ProtoSite, ProtoSiteId, Sfid, SplitSite,
};

use crate::chop::chop_sbbs;
use crate::config::{LayerSpec, PipelineConfig, ProtectedSet};
use crate::consolidate::{clean_features, coalesce, shrink_wrap, WRAP_GAP_PERCENT};
use crate::exclusion::{cull_erase_feats, get_erase_feats, ProtectedFeature};
use crate::fragments::cull_frags;
use crate::ledger::EvidenceTracker;
use crate::report::FailureReport;
use crate::scene::ExclusionLayers;
use crate::scratch::Scratch;
use crate::stage::{Stage, StageClock};

/// Shared, read-only inputs of every proto-site pass.
#[derive(Clone, Copy)]
pub struct UnitContext<'a> {
    /// Geometry kernel.
    pub ops: &'a dyn GeometryOps,
    /// Run configuration.
    pub config: &'a PipelineConfig,
    /// Selected evidence features.
    pub evidence: &'a [EvidenceFeature],
    /// Buffer blocks of the selected evidence.
    pub blocks: &'a [BufferBlock],
    /// Raw exclusion layers.
    pub layers: &'a ExclusionLayers,
}

/// One remerged cluster of a proto-site, before it receives a site id.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSite {
    /// Final boundary.
    pub shape: MultiPolygon<f64>,
    /// Live evidence within the search distance of the boundary.
    pub evidence: Vec<Sfid>,
}

/// Successful result of a proto-site pass.
#[derive(Debug, Clone)]
pub struct ProtoSiteOutcome {
    /// Proto-site identifier.
    pub proto_site: ProtoSiteId,
    /// Split sites the proto-site was carved into.
    pub split_sites: usize,
    /// Assembled boundaries; empty when no evidence survived.
    pub sites: Vec<AssembledSite>,
    /// Evidence bookkeeping for the ledger.
    pub tracker: EvidenceTracker,
    /// Wall-clock time spent on the proto-site.
    pub elapsed_ms: u64,
}

/// Evidence features intersecting a proto-site.
pub fn member_evidence<'a>(
    ops: &dyn GeometryOps,
    proto: &ProtoSite,
    evidence: &'a [EvidenceFeature],
) -> Vec<&'a EvidenceFeature> {
    evidence
        .iter()
        .filter(|feature| ops.intersects(&proto.shape, &feature.shape))
        .collect()
}

/// Runs every stage for one proto-site inside its own tracing span.
pub fn assemble_proto_site(
    ctx: &UnitContext<'_>,
    proto: &ProtoSite,
) -> Result<ProtoSiteOutcome, FailureReport> {
    let span = info_span!("proto_site", id = proto.id.as_raw());
    let _guard = span.enter();
    let clock = StageClock::start(ctx.config.execution.unit_timeout());
    let mut stage = Stage::Start;
    info!("proto-site started");

    match run_stages(ctx, proto, &clock, &mut stage) {
        Ok((split_sites, sites, tracker)) => {
            info!(
                split_sites,
                sites = sites.len(),
                elapsed_ms = clock.elapsed_ms(),
                "proto-site finished"
            );
            Ok(ProtoSiteOutcome {
                proto_site: proto.id,
                split_sites,
                sites,
                tracker,
                elapsed_ms: clock.elapsed_ms(),
            })
        }
        Err(err) => {
            error!(stage = %stage, error = %err, "proto-site failed");
            Err(FailureReport {
                proto_site: proto.id,
                stage,
                error: err,
                elapsed_ms: clock.elapsed_ms(),
            })
        }
    }
}

fn enter(clock: &StageClock, stage: &mut Stage, next: Stage) -> Result<(), SiteError> {
    clock.check(next)?;
    *stage = next;
    debug!(stage = %next, elapsed_ms = clock.elapsed_ms(), "stage");
    Ok(())
}

fn single(shape: &Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![shape.clone()])
}

type StageResult = (usize, Vec<AssembledSite>, EvidenceTracker);

fn run_stages(
    ctx: &UnitContext<'_>,
    proto: &ProtoSite,
    clock: &StageClock,
    stage: &mut Stage,
) -> Result<StageResult, SiteError> {
    let ops = ctx.ops;
    let config = ctx.config;
    let mut scratch = Scratch::open(&config.execution.scratch, proto.id)?;

    // Start
    let members = member_evidence(ops, proto, ctx.evidence);
    let mut tracker = EvidenceTracker::new(proto.id, &members);
    if members.is_empty() {
        info!("no evidence inside proto-site");
        return Ok((0, Vec::new(), tracker));
    }
    let blocks: Vec<BufferBlock> = ctx
        .blocks
        .iter()
        .filter(|block| ops.intersects(&proto.shape, &Footprint::Area(block.shape.clone())))
        .cloned()
        .collect();
    let reference: Vec<Footprint> = members.iter().map(|feature| feature.shape.clone()).collect();
    scratch.put("proto_site", std::slice::from_ref(&proto.shape))?;
    scratch.put(
        "buffer_blocks",
        &blocks.iter().map(|block| block.shape.clone()).collect::<Vec<_>>(),
    )?;
    debug!(evidence = members.len(), blocks = blocks.len(), "members selected");

    enter(clock, stage, Stage::BuildProcessingWindow)?;
    let window = ops.union(&ops.buffer(std::slice::from_ref(&proto.shape), config.window_distance, true)?)?;
    let use_all = config.site_type.uses_all_layers();
    let hydro = clip_layer(ops, &ctx.layers.hydro, &window)?;
    let (transportation, exclusion) = if use_all {
        (
            clip_layer(ops, &ctx.layers.transportation, &window)?,
            clip_layer(ops, &ctx.layers.exclusion, &window)?,
        )
    } else {
        (Vec::new(), Vec::new())
    };
    scratch.put("window", &window.0)?;
    debug!(
        hydro = hydro.len(),
        transportation = transportation.len(),
        exclusion = exclusion.len(),
        "layers clipped to window"
    );

    enter(clock, stage, Stage::SynthesizeExclusions)?;
    let mut erase: Vec<ErasePolygon> = Vec::new();
    erase.extend(synthesize_layer(
        ops,
        &hydro,
        &config.hydro,
        EraseSource::Hydro,
        &members,
        &blocks,
    )?);
    let mut manual: Vec<Polygon<f64>> = Vec::new();
    if use_all {
        erase.extend(synthesize_layer(
            ops,
            &transportation,
            &config.transportation,
            EraseSource::Transportation,
            &members,
            &blocks,
        )?);
        let culled = synthesize_layer(
            ops,
            &exclusion,
            &config.exclusion,
            EraseSource::Exclusion,
            &members,
            &blocks,
        )?;
        manual = culled.iter().map(|polygon| polygon.shape.clone()).collect();
        erase.extend(culled);
    }
    for source in [EraseSource::Hydro, EraseSource::Transportation, EraseSource::Exclusion] {
        let shapes: Vec<Polygon<f64>> = erase
            .iter()
            .filter(|polygon| polygon.source == source)
            .map(|polygon| polygon.shape.clone())
            .collect();
        scratch.put(&format!("erase_{}", source.label()), &shapes)?;
    }
    let merged: Vec<Polygon<f64>> = erase.into_iter().map(|polygon| polygon.shape).collect();
    let erase = if merged.is_empty() {
        merged
    } else {
        coalesce(ops, &merged, config.seam_distance)?
    };
    scratch.put("erase", &erase)?;
    scratch.put("erase_manual", &manual)?;

    enter(clock, stage, Stage::Chop)?;
    let chopped = chop_sbbs(ops, &reference, &blocks, &erase, config.chop_distance, &config.wrap)?;
    scratch.put("chop_clusters", &chopped.clusters)?;
    scratch.put("erase_refined", &chopped.erase)?;

    enter(clock, stage, Stage::EraseProtoSite)?;
    let carved = if chopped.erase.is_empty() {
        single(&proto.shape)
    } else {
        ops.erase(&single(&proto.shape), &ops.union(&chopped.erase)?)?
    };
    let cluster_refs: Vec<Footprint> = chopped.clusters.iter().cloned().map(Footprint::Area).collect();
    let split_sites: Vec<SplitSite> = cull_frags(ops, &clean_features(ops, &carved), &cluster_refs, 0.0)?
        .into_iter()
        .enumerate()
        .map(|(index, shape)| SplitSite {
            proto_site: proto.id,
            index,
            shape,
        })
        .collect();
    let split_shapes: Vec<Polygon<f64>> = split_sites.iter().map(|split| split.shape.clone()).collect();
    scratch.put("split_sites", &split_shapes)?;
    tracker.observe(ops, Stage::EraseProtoSite, &split_shapes, config.search_distance);
    debug!(split_sites = split_sites.len(), "proto-site carved");

    enter(clock, stage, Stage::PerSplitSite)?;
    let manual_mask = if manual.is_empty() {
        None
    } else {
        Some(ops.union(&manual)?)
    };
    let mut group: Vec<Polygon<f64>> = Vec::new();
    for split in &split_sites {
        clock.check(Stage::PerSplitSite)?;
        let inside: Vec<&EvidenceFeature> = members
            .iter()
            .copied()
            .filter(|feature| ops.intersects(&split.shape, &feature.shape))
            .collect();
        let fragments: Vec<Polygon<f64>> = chopped
            .fragments
            .iter()
            .filter(|fragment| inside.iter().any(|feature| feature.sfid == fragment.sfid))
            .map(|fragment| fragment.shape.clone())
            .collect();
        if fragments.is_empty() {
            debug!(split = split.index, "split site has no buffer-block fragments");
            continue;
        }
        let mut pieces = Vec::new();
        for wrap in shrink_wrap(ops, &fragments, config.chop_distance, &config.wrap)? {
            let mut clipped = ops.intersect(&wrap, &single(&split.shape))?;
            if let Some(mask) = &manual_mask {
                clipped = ops.erase(&clipped, mask)?;
            }
            pieces.extend(clean_features(ops, &clipped));
        }
        let survivors = cull_frags(ops, &pieces, &reference, config.search_distance)?;
        debug!(split = split.index, pieces = pieces.len(), survivors = survivors.len(), "split site rebuilt");
        group.extend(survivors);
    }
    scratch.put("split_results", &group)?;
    tracker.observe(ops, Stage::PerSplitSite, &group, config.search_distance);

    enter(clock, stage, Stage::Remerge)?;
    if group.is_empty() {
        info!("no split site survived");
        return Ok((split_sites.len(), Vec::new(), tracker));
    }
    let mut boundaries: Vec<MultiPolygon<f64>> = Vec::new();
    for wrap in shrink_wrap(ops, &group, config.remerge_distance, &config.wrap)? {
        let trimmed = match &manual_mask {
            Some(mask) => ops.erase(&wrap, mask)?,
            None => wrap,
        };
        let parts = cull_frags(
            ops,
            &clean_features(ops, &trimmed),
            &reference,
            config.search_distance,
        )?;
        if parts.is_empty() {
            continue;
        }
        let filled = ops.eliminate_parts(
            &MultiPolygon::new(parts),
            PartThreshold::Percent(WRAP_GAP_PERCENT),
            true,
        );
        let boundary = clean_features(ops, &ops.simplify(&filled, config.boundary_tolerance));
        if !boundary.is_empty() {
            boundaries.push(MultiPolygon::new(boundary));
        }
    }
    let remerged: Vec<Polygon<f64>> = boundaries.iter().flat_map(|shape| shape.0.iter().cloned()).collect();
    scratch.put("boundary", &remerged)?;
    tracker.observe(ops, Stage::Remerge, &remerged, config.search_distance);

    enter(clock, stage, Stage::Commit)?;
    // A feature straddling a split is credited to every cluster it reaches.
    let mut sites = Vec::with_capacity(boundaries.len());
    for shape in boundaries {
        let evidence = tracker.satisfied_by(ops, &shape.0, config.search_distance);
        if evidence.is_empty() {
            debug!(parts = shape.0.len(), "remerged cluster has no evidence; dropped");
            continue;
        }
        sites.push(AssembledSite { shape, evidence });
    }
    debug!(scratch = ?scratch.names(), "intermediates");
    Ok((split_sites.len(), sites, tracker))
}

fn clip_layer(
    ops: &dyn GeometryOps,
    layer: &[LayerFeature],
    window: &MultiPolygon<f64>,
) -> Result<Vec<LayerFeature>, SiteError> {
    let mut clipped = Vec::new();
    for feature in layer {
        let inside = ops.intersect(&single(&feature.shape), window)?;
        for shape in clean_features(ops, &inside) {
            clipped.push(LayerFeature {
                shape,
                attributes: feature.attributes.clone(),
            });
        }
    }
    Ok(clipped)
}

fn synthesize_layer(
    ops: &dyn GeometryOps,
    layer: &[LayerFeature],
    spec: &LayerSpec,
    source: EraseSource,
    members: &[&EvidenceFeature],
    blocks: &[BufferBlock],
) -> Result<Vec<ErasePolygon>, SiteError> {
    if layer.is_empty() {
        return Ok(Vec::new());
    }
    let areal: Vec<Polygon<f64>> = members
        .iter()
        .filter_map(|feature| feature.shape.as_area().cloned())
        .collect();
    let mask = if spec.mask_evidence {
        Some(areal.as_slice())
    } else {
        None
    };
    let shapes = get_erase_feats(ops, layer, &spec.query, spec.elimination_distance, mask)?;
    let erase: Vec<ErasePolygon> = shapes
        .into_iter()
        .map(|shape| ErasePolygon { source, shape })
        .collect();

    let protected: Vec<ProtectedFeature> = match spec.protect {
        ProtectedSet::Evidence => members
            .iter()
            .filter_map(|feature| {
                feature.shape.as_area().map(|polygon| ProtectedFeature {
                    id: feature.sfid.clone(),
                    shape: polygon.clone(),
                })
            })
            .collect(),
        ProtectedSet::BufferBlocks => blocks
            .iter()
            .enumerate()
            .map(|(index, block)| ProtectedFeature {
                id: Sfid::new(format!("{}:{index}", block.sfid)),
                shape: block.shape.clone(),
            })
            .collect(),
    };
    let outcome = cull_erase_feats(ops, &erase, &protected, spec.coverage)?;
    debug!(
        layer = source.label(),
        erase = outcome.erase.len(),
        protected = outcome.protected.len(),
        "layer synthesised"
    );
    Ok(outcome.erase)
}
