//! Opaque geographic feature records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A geographic feature as produced by a data-fetch collaborator.
///
/// The engine treats features as opaque records: `geometry` is carried
/// through untouched and `properties` is only ever passed along, except
/// where a filter variant chooses to annotate it. Each feature counts as
/// one unit against a session's feature limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Type discriminator, `"Feature"` for GeoJSON payloads.
    #[serde(rename = "type", default = "default_feature_type")]
    pub feature_type: String,
    /// Arbitrary per-feature attributes.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Geometry payload, opaque to the engine.
    #[serde(default)]
    pub geometry: Value,
}

fn default_feature_type() -> String {
    "Feature".to_string()
}

impl Feature {
    /// A feature with the given geometry and no properties.
    pub fn new(geometry: Value) -> Self {
        Self {
            feature_type: default_feature_type(),
            properties: Map::new(),
            geometry,
        }
    }

    /// Add a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}
