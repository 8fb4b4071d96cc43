use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{AttrValue, BufferBlock, ConSite, EvidenceFeature, GeometryOps, Sfid, SiteId};
use consite_geom::shape_fingerprint;

use crate::assemble::{assemble_proto_site, member_evidence, UnitContext};
use crate::config::PipelineConfig;
use crate::ledger::failed_entries;
use crate::report::{provenance, ProtoSiteReport, RunReport, SiteSummary, UnitState};
use crate::scene::Scene;
use crate::selection::{build_buffer_blocks, build_proto_sites, expand_selection};

/// Template column receiving the site type label.
pub const FIELD_SITE_TYPE: &str = "SITE_TYPE";
/// Template column receiving the boundary area.
pub const FIELD_AREA: &str = "AREA";
/// Template column receiving the number of satisfied evidence features.
pub const FIELD_EVIDENCE_COUNT: &str = "EVIDENCE_COUNT";

/// Committed sites together with the run report.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Committed sites in id order.
    pub sites: Vec<ConSite>,
    /// Report describing the run.
    pub report: RunReport,
}

fn select_evidence(
    ops: &dyn GeometryOps,
    scene: &Scene,
    config: &PipelineConfig,
) -> Result<Vec<EvidenceFeature>, SiteError> {
    let Some(seeds) = &scene.selection else {
        return Ok(scene.evidence.clone());
    };
    let chosen: BTreeSet<Sfid> = if config.expand_selection {
        expand_selection(ops, &scene.evidence, seeds, config.selection_distance)?
            .into_iter()
            .collect()
    } else {
        seeds.iter().cloned().collect()
    };
    Ok(scene
        .evidence
        .iter()
        .filter(|feature| chosen.contains(&feature.sfid))
        .cloned()
        .collect())
}

fn select_blocks(
    ops: &dyn GeometryOps,
    scene: &Scene,
    evidence: &[EvidenceFeature],
) -> Result<Vec<BufferBlock>, SiteError> {
    if scene.buffer_blocks.is_empty() {
        return build_buffer_blocks(ops, evidence);
    }
    let chosen: BTreeSet<&Sfid> = evidence.iter().map(|feature| &feature.sfid).collect();
    Ok(scene
        .buffer_blocks
        .iter()
        .filter(|block| chosen.contains(&block.sfid))
        .cloned()
        .collect())
}

/// Delineates conservation sites for every proto-site of a scene.
///
/// Proto-sites run on a pool of `execution.concurrency` threads. A failing
/// proto-site is recorded in the report and the run carries on, unless the
/// failure is fatal (an invalid configuration), in which case the whole run
/// fails. Sites are committed by a single writer in proto-site order, so site
/// ids do not depend on scheduling.
pub fn create_con_sites(
    ops: &dyn GeometryOps,
    scene: &Scene,
    config: &PipelineConfig,
) -> Result<RunOutput, SiteError> {
    let started = Instant::now();
    config.validate()?;
    let config_hash = config.config_hash()?;
    let input_hash = scene.input_hash()?;

    let evidence = select_evidence(ops, scene, config)?;
    let blocks = select_blocks(ops, scene, &evidence)?;
    let protos = build_proto_sites(ops, &blocks, config.consolidation_distance, &config.wrap)?;
    info!(
        evidence = evidence.len(),
        blocks = blocks.len(),
        proto_sites = protos.len(),
        site_type = config.site_type.label(),
        "delineation started"
    );

    let ctx = UnitContext {
        ops,
        config,
        evidence: &evidence,
        blocks: &blocks,
        layers: &scene.layers,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.execution.concurrency.max(1))
        .build()
        .map_err(|err| pool_error(config.execution.concurrency, err))?;
    let results: Vec<_> = pool.install(|| {
        protos
            .par_iter()
            .map(|proto| assemble_proto_site(&ctx, proto))
            .collect()
    });

    let mut sites = Vec::new();
    let mut proto_reports = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    let mut ledger = Vec::new();
    for (proto, result) in protos.iter().zip(results) {
        match result {
            Ok(outcome) => {
                let mut committed: BTreeMap<Sfid, Vec<SiteId>> = BTreeMap::new();
                let mut ids = Vec::with_capacity(outcome.sites.len());
                for assembled in outcome.sites {
                    let id = SiteId::from_raw(sites.len() as u64);
                    let area = ops.area(&assembled.shape);
                    let mut computed = BTreeMap::new();
                    computed.insert(FIELD_SITE_TYPE.to_string(), AttrValue::from(config.site_type.label()));
                    computed.insert(FIELD_AREA.to_string(), AttrValue::from(area));
                    computed.insert(
                        FIELD_EVIDENCE_COUNT.to_string(),
                        AttrValue::from(assembled.evidence.len() as f64),
                    );
                    for sfid in &assembled.evidence {
                        committed.entry(sfid.clone()).or_default().push(id);
                    }
                    ids.push(id);
                    sites.push(ConSite {
                        id,
                        proto_site: outcome.proto_site,
                        shape: assembled.shape,
                        evidence: assembled.evidence,
                        attributes: scene.template.instantiate(&computed),
                    });
                }
                let state = if ids.is_empty() {
                    UnitState::Empty
                } else {
                    UnitState::Committed
                };
                proto_reports.push(ProtoSiteReport {
                    proto_site: outcome.proto_site,
                    state,
                    split_sites: outcome.split_sites,
                    sites: ids,
                    elapsed_ms: outcome.elapsed_ms,
                });
                ledger.extend(outcome.tracker.into_entries(&committed));
            }
            Err(failure) => {
                if failure.error.is_fatal() {
                    return Err(failure.error);
                }
                let members: Vec<Sfid> = member_evidence(ops, proto, &evidence)
                    .into_iter()
                    .map(|feature| feature.sfid.clone())
                    .collect();
                ledger.extend(failed_entries(proto.id, &members, failure.stage));
                proto_reports.push(ProtoSiteReport {
                    proto_site: failure.proto_site,
                    state: UnitState::Failed,
                    split_sites: 0,
                    sites: Vec::new(),
                    elapsed_ms: failure.elapsed_ms,
                });
                failures.push(failure);
            }
        }
    }

    for failure in &failures {
        warn!(
            proto_site = %failure.proto_site,
            stage = %failure.stage,
            error = %failure.error,
            "proto-site isolated"
        );
    }
    let summaries = sites
        .iter()
        .map(|site| SiteSummary {
            id: site.id,
            proto_site: site.proto_site,
            area: ops.area(&site.shape),
            parts: site.shape.0.len(),
            fingerprint: shape_fingerprint(&site.shape.0),
            evidence: site.evidence.clone(),
        })
        .collect();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let report = RunReport {
        provenance: provenance(&config_hash, &input_hash),
        config_hash,
        proto_sites: proto_reports,
        committed: sites.len(),
        failures,
        sites: summaries,
        evidence: ledger,
        elapsed_ms,
    };
    info!(
        proto_sites = report.proto_sites.len(),
        committed = report.committed,
        failed = report.failures.len(),
        elapsed_ms,
        "delineation finished"
    );
    Ok(RunOutput { sites, report })
}

fn pool_error(concurrency: usize, err: impl ToString) -> SiteError {
    SiteError::Config(
        ErrorInfo::new("thread_pool", err.to_string())
            .with_context("concurrency", concurrency)
            .with_hint("lower execution.concurrency"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_fatal_configuration_errors() {
        let err = pool_error(512, "thread spawn refused");
        assert!(matches!(err, SiteError::Config(_)));
        assert!(err.is_fatal());
        assert_eq!(err.info().code, "thread_pool");
    }
}
