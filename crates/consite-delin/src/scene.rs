use std::path::Path;

use serde::{Deserialize, Serialize};

use consite_core::errors::SiteError;
use consite_core::{BufferBlock, EvidenceFeature, LayerFeature, Sfid, SiteTemplate};

use crate::persist::{content_hash, read_json, write_json};

/// Raw exclusion source layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExclusionLayers {
    /// Hydrography features.
    #[serde(default)]
    pub hydro: Vec<LayerFeature>,
    /// Transportation corridor features.
    #[serde(default)]
    pub transportation: Vec<LayerFeature>,
    /// Manually delineated exclusions.
    #[serde(default)]
    pub exclusion: Vec<LayerFeature>,
}

/// Everything a run consumes besides its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    /// Evidence features.
    pub evidence: Vec<EvidenceFeature>,
    /// Pre-built buffer blocks; built from the evidence when empty.
    #[serde(default)]
    pub buffer_blocks: Vec<BufferBlock>,
    /// Exclusion source layers.
    #[serde(default)]
    pub layers: ExclusionLayers,
    /// Attribute schema of the output sites.
    #[serde(default)]
    pub template: SiteTemplate,
    /// Evidence to delineate; every feature when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Vec<Sfid>>,
}

impl Scene {
    /// Deterministic hash of the scene contents.
    pub fn input_hash(&self) -> Result<String, SiteError> {
        content_hash(self)
    }
}

/// Reads a scene from a JSON file.
pub fn load_scene(path: &Path) -> Result<Scene, SiteError> {
    read_json(path, "scene_read")
}

/// Writes a scene as canonical JSON.
pub fn write_scene(path: &Path, scene: &Scene) -> Result<(), SiteError> {
    write_json(path, scene, "scene_write")
}
