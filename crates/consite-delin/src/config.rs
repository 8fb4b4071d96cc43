use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use consite_core::errors::{ErrorInfo, SiteError};
use consite_core::{SelectQuery, SiteType};

use crate::chop::DEFAULT_CHOP_DISTANCE;
use crate::consolidate::WrapOpts;
use crate::exclusion::CoveragePercent;
use crate::persist::{content_hash, read_yaml, to_yaml};

/// Which features an exclusion layer must not swallow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectedSet {
    /// Areal evidence features.
    #[default]
    Evidence,
    /// Buffer blocks.
    BufferBlocks,
}

/// Per-layer exclusion synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Features of the layer that act as exclusions.
    #[serde(default)]
    pub query: SelectQuery,
    /// Parts narrower than twice this distance are ignored.
    pub elimination_distance: f64,
    /// Coverage above which an exclusion is carved back around protected features.
    pub coverage: CoveragePercent,
    /// Features protected from this layer.
    #[serde(default)]
    pub protect: ProtectedSet,
    /// Subtract areal evidence from the synthesised erase polygons.
    #[serde(default)]
    pub mask_evidence: bool,
}

impl LayerSpec {
    fn hydro() -> Self {
        Self {
            query: SelectQuery::All,
            elimination_distance: 10.0,
            coverage: CoveragePercent::preset(25.0),
            protect: ProtectedSet::Evidence,
            mask_evidence: false,
        }
    }

    fn transportation() -> Self {
        Self {
            query: SelectQuery::All,
            elimination_distance: 5.0,
            coverage: CoveragePercent::preset(25.0),
            protect: ProtectedSet::Evidence,
            mask_evidence: false,
        }
    }

    fn exclusion() -> Self {
        Self {
            query: SelectQuery::All,
            elimination_distance: 1.0,
            coverage: CoveragePercent::preset(100.0),
            protect: ProtectedSet::BufferBlocks,
            mask_evidence: false,
        }
    }
}

/// Where per-proto-site intermediates live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScratchLocation {
    /// Intermediates stay in memory and are dropped with the unit.
    #[default]
    InMemory,
    /// Intermediates are also written as canonical JSON below `dir`.
    OnDisk {
        /// Root directory for scratch output.
        dir: PathBuf,
        /// Keep the files once the unit finishes.
        #[serde(default)]
        keep_intermediate: bool,
    },
}

/// Execution resources for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSpec {
    /// Number of proto-sites processed in parallel.
    #[serde(default = "ExecutionSpec::default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock budget per proto-site; unlimited when absent.
    #[serde(default)]
    pub unit_timeout_secs: Option<u64>,
    /// Scratch location for intermediates.
    #[serde(default)]
    pub scratch: ScratchLocation,
}

impl ExecutionSpec {
    fn default_concurrency() -> usize {
        1
    }

    /// Per-unit timeout as a duration.
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ExecutionSpec {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
            unit_timeout_secs: None,
            scratch: ScratchLocation::InMemory,
        }
    }
}

/// Full configuration of a delineation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Delineation flavour.
    #[serde(default)]
    pub site_type: SiteType,
    /// Grow the evidence selection to neighbouring features before delineation.
    #[serde(default)]
    pub expand_selection: bool,
    /// Reach used when growing the selection.
    #[serde(default = "PipelineConfig::default_selection_distance")]
    pub selection_distance: f64,
    /// Cluster distance used to build proto-sites from buffer blocks.
    #[serde(default = "PipelineConfig::default_consolidation_distance")]
    pub consolidation_distance: f64,
    /// Margin around a proto-site within which exclusion layers are consulted.
    #[serde(default = "PipelineConfig::default_window_distance")]
    pub window_distance: f64,
    /// Re-stitching distance used when chopping buffer blocks.
    #[serde(default = "PipelineConfig::default_chop_distance")]
    pub chop_distance: f64,
    /// Closing distance removing seams between merged exclusion layers.
    #[serde(default = "PipelineConfig::default_seam_distance")]
    pub seam_distance: f64,
    /// Maximum distance between a site fragment and its evidence.
    #[serde(default)]
    pub search_distance: f64,
    /// Cluster distance used to re-merge split sites.
    #[serde(default = "PipelineConfig::default_remerge_distance")]
    pub remerge_distance: f64,
    /// Shrink-wrap smoothing settings.
    #[serde(default)]
    pub wrap: WrapOpts,
    /// Simplification tolerance applied to final boundaries.
    #[serde(default = "PipelineConfig::default_boundary_tolerance")]
    pub boundary_tolerance: f64,
    /// Hydrography exclusions.
    #[serde(default = "LayerSpec::hydro")]
    pub hydro: LayerSpec,
    /// Transportation exclusions (standard sites only).
    #[serde(default = "LayerSpec::transportation")]
    pub transportation: LayerSpec,
    /// Manual exclusions (standard sites only).
    #[serde(default = "LayerSpec::exclusion")]
    pub exclusion: LayerSpec,
    /// Execution resources.
    #[serde(default)]
    pub execution: ExecutionSpec,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site_type: SiteType::Standard,
            expand_selection: false,
            selection_distance: Self::default_selection_distance(),
            consolidation_distance: Self::default_consolidation_distance(),
            window_distance: Self::default_window_distance(),
            chop_distance: Self::default_chop_distance(),
            seam_distance: Self::default_seam_distance(),
            search_distance: 0.0,
            remerge_distance: Self::default_remerge_distance(),
            wrap: WrapOpts::default(),
            boundary_tolerance: Self::default_boundary_tolerance(),
            hydro: LayerSpec::hydro(),
            transportation: LayerSpec::transportation(),
            exclusion: LayerSpec::exclusion(),
            execution: ExecutionSpec::default(),
        }
    }
}

impl PipelineConfig {
    fn default_selection_distance() -> f64 {
        1000.0
    }
    fn default_consolidation_distance() -> f64 {
        250.0
    }
    fn default_window_distance() -> f64 {
        1000.0
    }
    fn default_chop_distance() -> f64 {
        DEFAULT_CHOP_DISTANCE
    }
    fn default_seam_distance() -> f64 {
        1.0
    }
    fn default_remerge_distance() -> f64 {
        250.0
    }
    fn default_boundary_tolerance() -> f64 {
        1.0
    }

    /// Rejects parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SiteError> {
        let positive = [
            ("selection_distance", self.selection_distance),
            ("consolidation_distance", self.consolidation_distance),
            ("window_distance", self.window_distance),
            ("chop_distance", self.chop_distance),
            ("seam_distance", self.seam_distance),
            ("remerge_distance", self.remerge_distance),
            ("wrap.smoothing_multiplier", self.wrap.smoothing_multiplier),
            ("hydro.elimination_distance", self.hydro.elimination_distance),
            (
                "transportation.elimination_distance",
                self.transportation.elimination_distance,
            ),
            ("exclusion.elimination_distance", self.exclusion.elimination_distance),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, value, "must be a positive distance"));
            }
        }
        let non_negative = [
            ("search_distance", self.search_distance),
            ("boundary_tolerance", self.boundary_tolerance),
            ("wrap.simplify_tolerance", self.wrap.simplify_tolerance),
            ("hydro.coverage", self.hydro.coverage.value()),
            ("transportation.coverage", self.transportation.coverage.value()),
            ("exclusion.coverage", self.exclusion.coverage.value()),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, value, "must be finite and non-negative"));
            }
        }
        if self.execution.concurrency == 0 {
            return Err(invalid("execution.concurrency", 0.0, "must be at least one"));
        }
        if self.execution.unit_timeout_secs == Some(0) {
            return Err(invalid("execution.unit_timeout_secs", 0.0, "must be positive"));
        }
        Ok(())
    }

    /// Deterministic hash of the configuration contents.
    pub fn config_hash(&self) -> Result<String, SiteError> {
        content_hash(self)
    }

    /// Produces the YAML representation of the configuration.
    pub fn to_yaml_string(&self) -> Result<String, SiteError> {
        to_yaml(self)
    }
}

fn invalid(field: &str, value: f64, reason: &str) -> SiteError {
    SiteError::Config(
        ErrorInfo::new("invalid_parameter", format!("{field} {reason}"))
            .with_context("field", field)
            .with_context("value", value),
    )
}

/// Loads and validates a configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, SiteError> {
    let config: PipelineConfig = read_yaml(path.as_ref(), "config_read")?;
    config.validate()?;
    Ok(config)
}
