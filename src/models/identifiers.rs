// src/models/identifiers.rs
//! Lookup keys and caller-supplied display data.
//!
//! These types cross the boundary between the engine and its consumers: the
//! credential screens hand in [`Identifiers`], [`Meta`] and [`Field`]s and get
//! enriched fields back.

use serde::{Deserialize, Serialize};

/// Identifiers a credential can be resolved by.
///
/// `credential_definition_id` is the preferred key; `schema_id` and
/// `template_id` are fallbacks.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identifiers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl Identifiers {
    /// Identifiers holding only a credential definition id.
    pub fn for_credential_definition(id: impl Into<String>) -> Self {
        Self {
            credential_definition_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_schema_id(mut self, id: impl Into<String>) -> Self {
        self.schema_id = Some(id.into());
        self
    }

    pub fn with_template_id(mut self, id: impl Into<String>) -> Self {
        self.template_id = Some(id.into());
        self
    }

    /// Keys in resolution order: credential definition, schema, template.
    pub fn ordered(&self) -> impl Iterator<Item = &str> {
        [
            self.credential_definition_id.as_deref(),
            self.schema_id.as_deref(),
            self.template_id.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Display hints known by the caller (e.g. from the connection record).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// One credential attribute as shown to the user.
///
/// Callers fill `name`/`value`; the resolver fills the presentation data
/// (`label`, `format`, `field_type`, `encoding`) from the bundle.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl Field {
    /// A named attribute without a value.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}
