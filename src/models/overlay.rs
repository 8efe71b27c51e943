// src/models/overlay.rs
//! Overlay variants layered on a capture base.
//!
//! Every overlay carries a `type` tag. Localizable overlays (meta, label,
//! information) also carry a `language`. Parsing dispatches on the tag with an
//! exhaustive `match`; tags this engine does not know are kept as
//! [`UnknownOverlay`] so they survive a round trip but never take part in
//! resolution.

use crate::error::Result;
use crate::utils::color::generate_color;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The overlay families this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Meta,
    Label,
    Format,
    CharacterEncoding,
    Standard,
    Information,
    Branding,
    LegacyBranding,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 8] = [
        OverlayKind::Meta,
        OverlayKind::Label,
        OverlayKind::Format,
        OverlayKind::CharacterEncoding,
        OverlayKind::Standard,
        OverlayKind::Information,
        OverlayKind::Branding,
        OverlayKind::LegacyBranding,
    ];

    /// Wire `type` tag of this overlay family.
    pub fn type_tag(self) -> &'static str {
        match self {
            OverlayKind::Meta => "spec/overlays/meta/1.0",
            OverlayKind::Label => "spec/overlays/label/1.0",
            OverlayKind::Format => "spec/overlays/format/1.0",
            OverlayKind::CharacterEncoding => "spec/overlays/character_encoding/1.0",
            OverlayKind::Standard => "spec/overlays/standard/1.0",
            OverlayKind::Information => "spec/overlays/information/1.0",
            OverlayKind::Branding => "aries/overlays/branding/1.0",
            OverlayKind::LegacyBranding => "aries/overlays/branding/0.1",
        }
    }

    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_tag() == tag)
    }

    /// Whether overlays of this family are stored once per language.
    pub fn is_localized(self) -> bool {
        matches!(
            self,
            OverlayKind::Meta | OverlayKind::Label | OverlayKind::Information
        )
    }

    pub fn is_branding(self) -> bool {
        matches!(self, OverlayKind::Branding | OverlayKind::LegacyBranding)
    }
}

/// The two branding overlay revisions a resolver can prefer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrandingRevision {
    /// `aries/overlays/branding/0.1`
    Legacy,
    /// `aries/overlays/branding/1.0`
    #[default]
    Current,
}

impl BrandingRevision {
    pub fn kind(self) -> OverlayKind {
        match self {
            BrandingRevision::Legacy => OverlayKind::LegacyBranding,
            BrandingRevision::Current => OverlayKind::Branding,
        }
    }

    /// The revision consulted when this one is missing from a bundle.
    pub fn other(self) -> Self {
        match self {
            BrandingRevision::Legacy => BrandingRevision::Current,
            BrandingRevision::Current => BrandingRevision::Legacy,
        }
    }
}

/// Fields shared by every overlay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseOverlay {
    #[serde(rename = "type", default)]
    pub overlay_type: String,

    /// Digest of the capture base this overlay annotates
    #[serde(default)]
    pub capture_base: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl BaseOverlay {
    pub fn of_kind(kind: OverlayKind, capture_base: impl Into<String>) -> Self {
        Self {
            overlay_type: kind.type_tag().to_string(),
            capture_base: capture_base.into(),
            digest: None,
        }
    }
}

/// Per-language credential and issuer metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_support_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

/// Per-language attribute labels and categories.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub attribute_labels: IndexMap<String, String>,
    #[serde(default)]
    pub attribute_categories: IndexMap<String, String>,
    #[serde(default)]
    pub category_labels: IndexMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default)]
    pub attribute_formats: IndexMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterEncodingOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_character_encoding: Option<String>,
    #[serde(default)]
    pub attribute_character_encoding: IndexMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StandardOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default)]
    pub attribute_standards: IndexMap<String, String>,
}

/// Per-language long-form attribute descriptions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct InformationOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub attribute_information: IndexMap<String, String>,
}

/// Card branding, current revision (`aries/overlays/branding/1.0`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BrandingOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image_slice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_date_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date_attribute: Option<String>,
}

impl BrandingOverlay {
    /// Branding with only a primary background color.
    pub fn with_color(capture_base: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            base: BaseOverlay::of_kind(OverlayKind::Branding, capture_base),
            primary_background_color: Some(color.into()),
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyBrandingHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<String>,
    #[serde(default)]
    pub hide_issuer: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyBrandingFooter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Card branding, prior revision (`aries/overlays/branding/0.1`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyBrandingOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<LegacyBrandingHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<LegacyBrandingFooter>,
}

impl LegacyBrandingOverlay {
    pub fn with_color(capture_base: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            base: BaseOverlay::of_kind(OverlayKind::LegacyBranding, capture_base),
            background_color: Some(color.into()),
            ..Self::default()
        }
    }
}

/// Overlay with a tag this engine does not interpret.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UnknownOverlay {
    #[serde(flatten)]
    pub base: BaseOverlay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One parsed overlay.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Overlay {
    Meta(MetaOverlay),
    Label(LabelOverlay),
    Format(FormatOverlay),
    CharacterEncoding(CharacterEncodingOverlay),
    Standard(StandardOverlay),
    Information(InformationOverlay),
    Branding(BrandingOverlay),
    LegacyBranding(LegacyBrandingOverlay),
    Unknown(UnknownOverlay),
}

/// Reads the `type` tag of a raw overlay without parsing the rest.
pub fn raw_type_tag(raw: &Value) -> Option<&str> {
    raw.get("type").and_then(Value::as_str)
}

impl Overlay {
    /// Parses one raw overlay document.
    ///
    /// Branding overlays get a deterministic background color derived from
    /// `credential_definition_id` when the document does not set one.
    ///
    /// # Errors
    /// Returns a JSON error when a known overlay type has the wrong shape.
    pub fn parse(credential_definition_id: &str, raw: Value) -> Result<Self> {
        let kind = raw_type_tag(&raw).and_then(OverlayKind::from_type_tag);
        let overlay = match kind {
            Some(OverlayKind::Meta) => Overlay::Meta(serde_json::from_value(raw)?),
            Some(OverlayKind::Label) => Overlay::Label(serde_json::from_value(raw)?),
            Some(OverlayKind::Format) => Overlay::Format(serde_json::from_value(raw)?),
            Some(OverlayKind::CharacterEncoding) => {
                Overlay::CharacterEncoding(serde_json::from_value(raw)?)
            }
            Some(OverlayKind::Standard) => Overlay::Standard(serde_json::from_value(raw)?),
            Some(OverlayKind::Information) => Overlay::Information(serde_json::from_value(raw)?),
            Some(OverlayKind::Branding) => {
                let mut branding: BrandingOverlay = serde_json::from_value(raw)?;
                if branding.primary_background_color.is_none() {
                    branding.primary_background_color =
                        Some(generate_color(credential_definition_id));
                }
                Overlay::Branding(branding)
            }
            Some(OverlayKind::LegacyBranding) => {
                let mut branding: LegacyBrandingOverlay = serde_json::from_value(raw)?;
                if branding.background_color.is_none() {
                    branding.background_color = Some(generate_color(credential_definition_id));
                }
                Overlay::LegacyBranding(branding)
            }
            None => Overlay::Unknown(serde_json::from_value(raw)?),
        };
        Ok(overlay)
    }

    /// Overlay family, `None` for unknown tags.
    pub fn kind(&self) -> Option<OverlayKind> {
        match self {
            Overlay::Meta(_) => Some(OverlayKind::Meta),
            Overlay::Label(_) => Some(OverlayKind::Label),
            Overlay::Format(_) => Some(OverlayKind::Format),
            Overlay::CharacterEncoding(_) => Some(OverlayKind::CharacterEncoding),
            Overlay::Standard(_) => Some(OverlayKind::Standard),
            Overlay::Information(_) => Some(OverlayKind::Information),
            Overlay::Branding(_) => Some(OverlayKind::Branding),
            Overlay::LegacyBranding(_) => Some(OverlayKind::LegacyBranding),
            Overlay::Unknown(_) => None,
        }
    }

    pub fn base(&self) -> &BaseOverlay {
        match self {
            Overlay::Meta(o) => &o.base,
            Overlay::Label(o) => &o.base,
            Overlay::Format(o) => &o.base,
            Overlay::CharacterEncoding(o) => &o.base,
            Overlay::Standard(o) => &o.base,
            Overlay::Information(o) => &o.base,
            Overlay::Branding(o) => &o.base,
            Overlay::LegacyBranding(o) => &o.base,
            Overlay::Unknown(o) => &o.base,
        }
    }

    /// The raw `type` tag, including unknown ones.
    pub fn type_tag(&self) -> &str {
        &self.base().overlay_type
    }

    /// Language of a localizable overlay; `None` when absent or not localizable.
    pub fn language(&self) -> Option<&str> {
        match self {
            Overlay::Meta(o) => o.language.as_deref(),
            Overlay::Label(o) => o.language.as_deref(),
            Overlay::Information(o) => o.language.as_deref(),
            Overlay::Unknown(o) => o.language.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_tags_round_trip() {
        for kind in OverlayKind::ALL {
            assert_eq!(OverlayKind::from_type_tag(kind.type_tag()), Some(kind));
        }
        assert_eq!(OverlayKind::from_type_tag("spec/overlays/unit/1.0"), None);
    }

    #[test]
    fn test_parse_meta_overlay() {
        let overlay = Overlay::parse(
            "cd",
            json!({
                "capture_base": "EBQbQEV6",
                "type": "spec/overlays/meta/1.0",
                "language": "fr",
                "name": "Carte étudiante",
                "issuer": "Université"
            }),
        )
        .unwrap();

        assert_eq!(overlay.kind(), Some(OverlayKind::Meta));
        assert_eq!(overlay.language(), Some("fr"));
        assert_eq!(overlay.base().capture_base, "EBQbQEV6");
        match overlay {
            Overlay::Meta(meta) => {
                assert_eq!(meta.name.as_deref(), Some("Carte étudiante"));
                assert_eq!(meta.issuer.as_deref(), Some("Université"));
                assert!(meta.description.is_none());
            }
            other => panic!("expected meta overlay, got {:?}", other),
        }
    }

    #[test]
    fn test_branding_color_fallback_is_deterministic() {
        let raw = json!({"capture_base": "", "type": "aries/overlays/branding/1.0"});
        let first = Overlay::parse("cred-def-1", raw.clone()).unwrap();
        let second = Overlay::parse("cred-def-1", raw).unwrap();
        assert_eq!(first, second);
        match first {
            Overlay::Branding(branding) => assert_eq!(
                branding.primary_background_color,
                Some(generate_color("cred-def-1"))
            ),
            other => panic!("expected branding overlay, got {:?}", other),
        }

        let explicit = Overlay::parse(
            "cred-def-1",
            json!({"type": "aries/overlays/branding/0.1", "background_color": "#003366"}),
        )
        .unwrap();
        match explicit {
            Overlay::LegacyBranding(legacy) => {
                assert_eq!(legacy.background_color.as_deref(), Some("#003366"))
            }
            other => panic!("expected legacy branding overlay, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_overlay_is_preserved() {
        let overlay = Overlay::parse(
            "cd",
            json!({"type": "spec/overlays/unit/1.0", "capture_base": "x", "attribute_units": {"h": "cm"}}),
        )
        .unwrap();
        assert_eq!(overlay.kind(), None);
        assert_eq!(overlay.type_tag(), "spec/overlays/unit/1.0");
        match overlay {
            Overlay::Unknown(unknown) => {
                assert_eq!(unknown.extra["attribute_units"], json!({"h": "cm"}))
            }
            other => panic!("expected unknown overlay, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_known_overlay_fails() {
        let result = Overlay::parse(
            "cd",
            json!({"type": "spec/overlays/format/1.0", "attribute_formats": ["not", "a", "map"]}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_branding_revision_fallback_order() {
        assert_eq!(BrandingRevision::default(), BrandingRevision::Current);
        assert_eq!(BrandingRevision::Current.other(), BrandingRevision::Legacy);
        assert_eq!(BrandingRevision::Legacy.kind(), OverlayKind::LegacyBranding);
    }
}
