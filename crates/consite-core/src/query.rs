//! Attribute selection queries applied to exclusion source layers.

use serde::{Deserialize, Serialize};

use crate::types::{AttrValue, LayerFeature};

/// Predicate over a layer feature's attribute row.
///
/// Queries are written in YAML alongside the pipeline configuration, e.g.
///
/// ```yaml
/// in:
///   field: FTYPE
///   values: [Lake, River]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectQuery {
    /// Every feature matches.
    #[default]
    All,
    /// Attribute equals the value.
    Eq {
        /// Attribute name.
        field: String,
        /// Expected value.
        value: AttrValue,
    },
    /// Attribute equals one of the values.
    In {
        /// Attribute name.
        field: String,
        /// Accepted values.
        values: Vec<AttrValue>,
    },
    /// Numeric attribute lies in `[min, max]`; missing bounds are open.
    Range {
        /// Attribute name.
        field: String,
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<f64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<f64>,
    },
    /// Negation.
    Not(Box<SelectQuery>),
    /// Conjunction; empty matches everything.
    And(Vec<SelectQuery>),
    /// Disjunction; empty matches nothing.
    Or(Vec<SelectQuery>),
}

impl SelectQuery {
    /// Evaluates the query against a feature.
    pub fn matches(&self, feature: &LayerFeature) -> bool {
        match self {
            SelectQuery::All => true,
            SelectQuery::Eq { field, value } => feature.attributes.get(field) == Some(value),
            SelectQuery::In { field, values } => feature
                .attributes
                .get(field)
                .map(|found| values.contains(found))
                .unwrap_or(false),
            SelectQuery::Range { field, min, max } => {
                match feature.attributes.get(field).and_then(AttrValue::as_number) {
                    Some(value) => {
                        min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi)
                    }
                    None => false,
                }
            }
            SelectQuery::Not(inner) => !inner.matches(feature),
            SelectQuery::And(parts) => parts.iter().all(|part| part.matches(feature)),
            SelectQuery::Or(parts) => parts.iter().any(|part| part.matches(feature)),
        }
    }

    /// Returns the features matching the query, in input order.
    pub fn select<'a>(&self, features: &'a [LayerFeature]) -> Vec<&'a LayerFeature> {
        features.iter().filter(|feature| self.matches(feature)).collect()
    }
}
