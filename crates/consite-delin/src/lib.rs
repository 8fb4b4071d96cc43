#![deny(missing_docs)]
#![doc = "Conservation site delineation: consolidation primitives, exclusion carving and batch site assembly."]

pub mod assemble;
/// Buffer-block carving with exclusion refinement.
pub mod chop;
/// Pipeline configuration loading and validation.
pub mod config;
pub mod consolidate;
/// Batch execution over proto-sites.
pub mod dispatch;
pub mod exclusion;
/// Fragment survival filter.
pub mod fragments;
/// Evidence ledger tracking each feature to a site or a culling stage.
pub mod ledger;
mod persist;
/// Run reports and output persistence.
pub mod report;
/// Scene inputs: evidence, buffer blocks, layers and template.
pub mod scene;
pub mod scratch;
pub mod selection;
/// Assembly stages and the per-unit stage clock.
pub mod stage;

pub use assemble::{assemble_proto_site, AssembledSite, ProtoSiteOutcome, UnitContext};
pub use chop::{chop_sbbs, ChopOutcome};
pub use config::{
    load_config, ExecutionSpec, LayerSpec, PipelineConfig, ProtectedSet, ScratchLocation,
};
pub use consolidate::{clean_features, coalesce, shrink_wrap, WrapOpts};
pub use dispatch::{create_con_sites, RunOutput};
pub use exclusion::{
    cull_erase_feats, get_erase_feats, CoveragePercent, CoverageRow, CullOutcome,
    ProtectedFeature,
};
pub use fragments::cull_frags;
pub use ledger::{EvidenceEntry, EvidenceFate, EvidenceTracker};
pub use report::{
    load_report, load_sites, write_report, write_sites, FailureReport, ProtoSiteReport,
    RunReport, RunSummary, SiteSummary, UnitState,
};
pub use scene::{load_scene, write_scene, ExclusionLayers, Scene};
pub use scratch::Scratch;
pub use selection::{build_buffer_blocks, build_proto_sites, expand_selection};
pub use stage::{Stage, StageClock};
