use std::collections::BTreeMap;

use geo::{LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::{ProtoSiteId, Sfid, SiteId};

/// Geometry of an evidence feature or of any reference used in proximity tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "geometry", rename_all = "kebab-case")]
pub enum Footprint {
    /// Point evidence (a single observation).
    Point(Point<f64>),
    /// Linear evidence (a surveyed stream reach, a transect).
    Line(LineString<f64>),
    /// Areal evidence or a derived polygon such as a buffer-block cluster.
    Area(Polygon<f64>),
}

impl Footprint {
    /// The enclosed polygon, for areal footprints.
    pub fn as_area(&self) -> Option<&Polygon<f64>> {
        match self {
            Footprint::Area(polygon) => Some(polygon),
            _ => None,
        }
    }
}

impl From<Polygon<f64>> for Footprint {
    fn from(value: Polygon<f64>) -> Self {
        Footprint::Area(value)
    }
}

/// Procedural (evidence) feature justifying protection at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFeature {
    /// Unique source feature identifier.
    pub sfid: Sfid,
    /// Categorical delineation rule code.
    pub rule: String,
    /// Buffer distance applied when building the feature's buffer block.
    pub buffer_distance: f64,
    /// Feature geometry.
    pub shape: Footprint,
}

/// Evidence feature expanded by its rule-specific distance. Joined to the
/// evidence feature by `sfid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferBlock {
    /// Identifier of the evidence feature this block was built from.
    pub sfid: Sfid,
    /// Block geometry.
    pub shape: Polygon<f64>,
}

/// Source layer an erase polygon was synthesised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EraseSource {
    /// Hydrography (open water, wide rivers).
    Hydro,
    /// Transportation corridors (roads, rail).
    Transportation,
    /// Manually delineated exclusions.
    Exclusion,
}

impl EraseSource {
    /// Stable label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            EraseSource::Hydro => "hydro",
            EraseSource::Transportation => "transportation",
            EraseSource::Exclusion => "exclusion",
        }
    }
}

/// Polygon to be subtracted from site geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErasePolygon {
    /// Layer the polygon was derived from.
    pub source: EraseSource,
    /// Erase geometry.
    pub shape: Polygon<f64>,
}

/// Attribute value carried by layer features and output sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Missing value.
    Null,
    /// Boolean flag.
    Flag(bool),
    /// Numeric value.
    Number(f64),
    /// Free text.
    Text(String),
}

impl AttrValue {
    /// Returns the numeric payload, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

/// Attributed polygon from an exclusion source layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerFeature {
    /// Feature geometry.
    pub shape: Polygon<f64>,
    /// Attribute table row.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl LayerFeature {
    /// Creates a feature without attributes.
    pub fn bare(shape: Polygon<f64>) -> Self {
        Self {
            shape,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute to the feature.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Connected component of consolidated buffer blocks, before exclusion carving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtoSite {
    /// Stable identifier within a run.
    pub id: ProtoSiteId,
    /// Proto-site geometry.
    pub shape: Polygon<f64>,
}

/// Fragment of a proto-site surviving exclusion carving and proximity filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSite {
    /// Proto-site the fragment was carved from.
    pub proto_site: ProtoSiteId,
    /// Position of the fragment within its proto-site.
    pub index: usize,
    /// Fragment geometry.
    pub shape: Polygon<f64>,
}

/// Delineation flavour. `Alternate` sites ignore transportation and manual
/// exclusion layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SiteType {
    /// Full delineation with every exclusion layer.
    #[default]
    Standard,
    /// Hydrography-only delineation.
    Alternate,
}

impl SiteType {
    /// Whether transportation and manual exclusion layers are consulted.
    pub fn uses_all_layers(&self) -> bool {
        matches!(self, SiteType::Standard)
    }

    /// Stable label used for the `SITE_TYPE` attribute.
    pub fn label(&self) -> &'static str {
        match self {
            SiteType::Standard => "standard",
            SiteType::Alternate => "alternate",
        }
    }
}

/// Final committed site boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConSite {
    /// Identifier assigned at commit time.
    pub id: SiteId,
    /// Proto-site this site descends from.
    pub proto_site: ProtoSiteId,
    /// Boundary geometry.
    pub shape: MultiPolygon<f64>,
    /// Evidence features satisfied by the boundary.
    pub evidence: Vec<Sfid>,
    /// Attribute row following the site template schema.
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Column declared by a site template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Column name.
    pub name: String,
    /// Value used when nothing is computed for the column.
    #[serde(default = "FieldDef::default_value")]
    pub default: AttrValue,
}

impl FieldDef {
    fn default_value() -> AttrValue {
        AttrValue::Null
    }
}

/// Attribute schema every committed site must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SiteTemplate {
    /// Ordered column definitions.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl SiteTemplate {
    /// Builds an attribute row with exactly the template's columns. Computed
    /// values override defaults; computed keys absent from the template are
    /// dropped.
    pub fn instantiate(&self, computed: &BTreeMap<String, AttrValue>) -> BTreeMap<String, AttrValue> {
        self.fields
            .iter()
            .map(|field| {
                let value = computed
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| field.default.clone());
                (field.name.clone(), value)
            })
            .collect()
    }
}
