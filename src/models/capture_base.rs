// src/models/capture_base.rs
//! Capture Base: the attribute dictionary of one credential schema.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Type tag carried by capture bases.
pub const CAPTURE_BASE_TYPE: &str = "spec/capture_base/1.0";

fn default_capture_base_type() -> String {
    CAPTURE_BASE_TYPE.to_string()
}

/// Attribute name to attribute type mapping for one schema.
///
/// Attributes keep the order of the bundle document; keys are unique by
/// construction of the map.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaptureBase {
    #[serde(rename = "type", default = "default_capture_base_type")]
    pub capture_base_type: String,

    #[serde(default)]
    pub classification: String,

    /// Attribute name to base type (`Text`, `DateInt`, `Numeric`, ...)
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Attributes holding personal data that should be highlighted
    #[serde(default)]
    pub flagged_attributes: Vec<String>,

    /// Content digest, referenced by overlays through `capture_base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl CaptureBase {
    /// An empty capture base, used by synthesized bundles.
    pub fn empty() -> Self {
        Self {
            capture_base_type: default_capture_base_type(),
            classification: String::new(),
            attributes: IndexMap::new(),
            flagged_attributes: Vec::new(),
            digest: None,
        }
    }

    /// Returns the base type of an attribute, if the schema defines it.
    pub fn attribute_type(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_flagged(&self, name: &str) -> bool {
        self.flagged_attributes.iter().any(|flagged| flagged == name)
    }
}
