use std::collections::BTreeMap;

use geo::Polygon;
use serde::{Deserialize, Serialize};
use tracing::warn;

use consite_core::{EvidenceFeature, Footprint, GeometryOps, ProtoSiteId, Sfid, SiteId};

use crate::stage::Stage;

/// What became of an evidence feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fate", rename_all = "kebab-case")]
pub enum EvidenceFate {
    /// The feature is satisfied by committed sites.
    Committed {
        /// Sites satisfying the feature, in id order. More than one only when
        /// the feature straddles a split.
        sites: Vec<SiteId>,
    },
    /// No surviving geometry lies within the search distance after `stage`.
    Culled {
        /// Stage at which the feature was lost.
        stage: Stage,
    },
    /// The proto-site holding the feature failed.
    Failed {
        /// Stage at which the proto-site failed.
        stage: Stage,
    },
}

/// Ledger row for one evidence feature of one proto-site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// Evidence feature.
    pub sfid: Sfid,
    /// Proto-site the feature belonged to.
    pub proto_site: ProtoSiteId,
    /// Outcome for the feature.
    #[serde(flatten)]
    pub fate: EvidenceFate,
}

/// Follows the member evidence of a proto-site through the stages.
#[derive(Debug, Clone)]
pub struct EvidenceTracker {
    proto_site: ProtoSiteId,
    live: Vec<(Sfid, Footprint)>,
    culled: Vec<(Sfid, Stage)>,
}

impl EvidenceTracker {
    /// Starts tracking the given member features.
    pub fn new(proto_site: ProtoSiteId, members: &[&EvidenceFeature]) -> Self {
        Self {
            proto_site,
            live: members
                .iter()
                .map(|feature| (feature.sfid.clone(), feature.shape.clone()))
                .collect(),
            culled: Vec::new(),
        }
    }

    /// Evidence still satisfied by the latest observed geometry.
    pub fn live(&self) -> Vec<&Sfid> {
        self.live.iter().map(|(sfid, _)| sfid).collect()
    }

    /// Live evidence lying within `search_distance` of any of `shapes`.
    pub fn satisfied_by(
        &self,
        ops: &dyn GeometryOps,
        shapes: &[Polygon<f64>],
        search_distance: f64,
    ) -> Vec<Sfid> {
        self.live
            .iter()
            .filter(|(_, footprint)| within(ops, shapes, footprint, search_distance))
            .map(|(sfid, _)| sfid.clone())
            .collect()
    }

    /// Marks live features no longer within `search_distance` of `shapes`
    /// as culled at `stage`.
    pub fn observe(
        &mut self,
        ops: &dyn GeometryOps,
        stage: Stage,
        shapes: &[Polygon<f64>],
        search_distance: f64,
    ) {
        let (kept, lost): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(|(_, footprint)| within(ops, shapes, footprint, search_distance));
        self.live = kept;
        for (sfid, _) in lost {
            warn!(proto_site = %self.proto_site, sfid = %sfid, stage = %stage, "evidence culled");
            self.culled.push((sfid, stage));
        }
    }

    /// Closes the ledger: features recorded in `committed` map to their sites,
    /// remaining live features are attributed to the commit stage.
    pub fn into_entries(self, committed: &BTreeMap<Sfid, Vec<SiteId>>) -> Vec<EvidenceEntry> {
        let proto_site = self.proto_site;
        let mut entries: Vec<EvidenceEntry> = self
            .culled
            .into_iter()
            .map(|(sfid, stage)| EvidenceEntry {
                sfid,
                proto_site,
                fate: EvidenceFate::Culled { stage },
            })
            .collect();
        for (sfid, _) in self.live {
            let fate = match committed.get(&sfid) {
                Some(sites) => EvidenceFate::Committed { sites: sites.clone() },
                None => EvidenceFate::Culled {
                    stage: Stage::Commit,
                },
            };
            entries.push(EvidenceEntry {
                sfid,
                proto_site,
                fate,
            });
        }
        entries.sort_by(|a, b| a.sfid.cmp(&b.sfid));
        entries
    }
}

fn within(ops: &dyn GeometryOps, shapes: &[Polygon<f64>], footprint: &Footprint, search_distance: f64) -> bool {
    shapes.iter().any(|shape| {
        ops.nearest_distance(shape, std::slice::from_ref(footprint))
            .map_or(false, |distance| distance <= search_distance)
    })
}

/// Ledger rows for every member of a failed proto-site.
pub fn failed_entries(proto_site: ProtoSiteId, members: &[Sfid], stage: Stage) -> Vec<EvidenceEntry> {
    members
        .iter()
        .map(|sfid| EvidenceEntry {
            sfid: sfid.clone(),
            proto_site,
            fate: EvidenceFate::Failed { stage },
        })
        .collect()
}
