use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use consite_core::errors::SiteError;
use consite_core::provenance::{RunProvenance, SchemaVersion};
use consite_core::{ConSite, ProtoSiteId, Sfid, SiteId};

use crate::ledger::{EvidenceEntry, EvidenceFate};
use crate::persist::{read_json, write_json};
use crate::stage::Stage;

/// Failure of a single proto-site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Proto-site that failed.
    pub proto_site: ProtoSiteId,
    /// Stage running when the failure happened.
    pub stage: Stage,
    /// Error raised by the stage.
    pub error: SiteError,
    /// Time spent on the proto-site before failing.
    pub elapsed_ms: u64,
}

/// Terminal state of a proto-site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitState {
    /// At least one site was committed.
    Committed,
    /// The proto-site finished without any surviving evidence.
    Empty,
    /// The proto-site failed and was isolated.
    Failed,
}

/// Report entry for one proto-site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtoSiteReport {
    /// Proto-site identifier.
    pub proto_site: ProtoSiteId,
    /// Terminal state.
    pub state: UnitState,
    /// Number of split sites the proto-site was carved into.
    pub split_sites: usize,
    /// Sites committed from the proto-site.
    pub sites: Vec<SiteId>,
    /// Wall-clock time spent on the proto-site.
    pub elapsed_ms: u64,
}

/// Compact description of a committed site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    /// Site identifier.
    pub id: SiteId,
    /// Proto-site the site descends from.
    pub proto_site: ProtoSiteId,
    /// Boundary area.
    pub area: f64,
    /// Number of polygon parts.
    pub parts: usize,
    /// Order-independent boundary fingerprint; equal across runs that
    /// produce the same boundary up to coordinate noise.
    pub fingerprint: String,
    /// Evidence satisfied by the site.
    pub evidence: Vec<Sfid>,
}

/// Headline counts of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of proto-sites processed.
    pub proto_sites: usize,
    /// Number of committed sites.
    pub committed: usize,
    /// Number of proto-sites without surviving evidence.
    pub empty: usize,
    /// Number of failed proto-sites.
    pub failed: usize,
    /// Evidence features culled along the way.
    pub culled_evidence: usize,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Canonical report of a delineation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Provenance metadata.
    pub provenance: RunProvenance,
    /// Hash of the configuration driving the run.
    pub config_hash: String,
    /// Per-proto-site entries ordered by id.
    pub proto_sites: Vec<ProtoSiteReport>,
    /// Number of committed sites.
    pub committed: usize,
    /// Isolated proto-site failures.
    pub failures: Vec<FailureReport>,
    /// Committed sites.
    pub sites: Vec<SiteSummary>,
    /// Evidence ledger.
    pub evidence: Vec<EvidenceEntry>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Headline counts.
    pub fn summary(&self) -> RunSummary {
        let count = |state: UnitState| {
            self.proto_sites
                .iter()
                .filter(|entry| entry.state == state)
                .count()
        };
        RunSummary {
            proto_sites: self.proto_sites.len(),
            committed: self.committed,
            empty: count(UnitState::Empty),
            failed: count(UnitState::Failed),
            culled_evidence: self
                .evidence
                .iter()
                .filter(|entry| matches!(entry.fate, EvidenceFate::Culled { .. }))
                .count(),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Builds run provenance stamped with the current time.
pub fn provenance(config_hash: &str, input_hash: &str) -> RunProvenance {
    let mut versions = BTreeMap::new();
    versions.insert(
        "consite-delin".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    RunProvenance {
        schema_version: SchemaVersion::default(),
        config_hash: config_hash.to_string(),
        input_hash: input_hash.to_string(),
        created_at: Utc::now().to_rfc3339(),
        tool_versions: versions,
    }
}

/// Writes a run report as canonical JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<(), SiteError> {
    write_json(path, report, "run_report_write")
}

/// Reads a run report.
pub fn load_report(path: &Path) -> Result<RunReport, SiteError> {
    read_json(path, "run_report_read")
}

/// Writes the committed site collection as canonical JSON.
pub fn write_sites(path: &Path, sites: &[ConSite]) -> Result<(), SiteError> {
    write_json(path, &sites, "sites_write")
}

/// Reads a committed site collection.
pub fn load_sites(path: &Path) -> Result<Vec<ConSite>, SiteError> {
    read_json(path, "sites_read")
}
