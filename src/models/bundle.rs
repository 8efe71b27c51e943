// src/models/bundle.rs
//! Overlay Bundle: one capture base plus its overlays for one credential
//! definition, with the projections the credential screens read.

use crate::error::Result;
use crate::models::capture_base::CaptureBase;
use crate::models::overlay::{
    raw_type_tag, BrandingOverlay, LegacyBrandingOverlay, MetaOverlay, Overlay, OverlayKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Language used for overlays that do not declare one.
pub const DEFAULT_BUNDLE_LANGUAGE: &str = "en";

/// A bundle document as published by the bundle origin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RawOverlayBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_base: Option<CaptureBase>,
    #[serde(default)]
    pub overlays: Vec<Value>,
}

/// Per-language values keyed by language tag.
pub type Localized = BTreeMap<String, String>;

/// Per-language projection of every Meta overlay in a bundle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub name: Localized,
    pub description: Localized,
    pub credential_help_text: Localized,
    pub credential_support_url: Localized,
    pub issuer: Localized,
    pub issuer_description: Localized,
    pub issuer_url: Localized,
}

impl BundleMetadata {
    fn absorb(&mut self, meta: &MetaOverlay) {
        let language = meta
            .language
            .clone()
            .unwrap_or_else(|| DEFAULT_BUNDLE_LANGUAGE.to_string());
        let pairs = [
            (&mut self.name, &meta.name),
            (&mut self.description, &meta.description),
            (&mut self.credential_help_text, &meta.credential_help_text),
            (&mut self.credential_support_url, &meta.credential_support_url),
            (&mut self.issuer, &meta.issuer),
            (&mut self.issuer_description, &meta.issuer_description),
            (&mut self.issuer_url, &meta.issuer_url),
        ];
        for (target, value) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                target.insert(language.clone(), value.to_string());
            }
        }
    }
}

/// Everything the bundle knows about one capture-base attribute.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BundleAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub label: Localized,
    pub information: Localized,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
}

/// Parsed, immutable overlay bundle.
///
/// All projections are computed once in [`OverlayBundle::new`]; the value is
/// shared behind an `Arc` by the resolvers and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBundle {
    credential_definition_id: String,
    capture_base: Option<CaptureBase>,
    overlays: Vec<Overlay>,
    languages: Vec<String>,
    metadata: BundleMetadata,
    attributes: Vec<BundleAttribute>,
    attribute_positions: HashMap<String, usize>,
    flagged_attributes: Vec<String>,
}

impl OverlayBundle {
    /// Builds a bundle from a raw bundle document.
    ///
    /// Non-branding overlays are parsed first, then legacy branding, then
    /// current branding; branding overlays need `credential_definition_id` to
    /// derive a fallback background color.
    ///
    /// # Arguments
    /// * `credential_definition_id` - Credential definition the bundle describes
    /// * `raw` - Raw bundle document
    ///
    /// # Returns
    /// The parsed bundle, or a JSON error if a known overlay is malformed
    pub fn new(credential_definition_id: &str, raw: RawOverlayBundle) -> Result<Self> {
        let RawOverlayBundle {
            capture_base,
            overlays: raw_overlays,
        } = raw;

        let branding_tags = [
            OverlayKind::LegacyBranding.type_tag(),
            OverlayKind::Branding.type_tag(),
        ];
        let (branding, others): (Vec<Value>, Vec<Value>) = raw_overlays
            .into_iter()
            .partition(|raw| raw_type_tag(raw).map_or(false, |tag| branding_tags.contains(&tag)));

        let mut overlays = Vec::with_capacity(branding.len() + others.len());
        for raw in others {
            overlays.push(Overlay::parse(credential_definition_id, raw)?);
        }
        for tag in branding_tags {
            for raw in branding.iter().filter(|raw| raw_type_tag(raw) == Some(tag)) {
                overlays.push(Overlay::parse(credential_definition_id, raw.clone())?);
            }
        }

        Ok(Self::from_parts(credential_definition_id, capture_base, overlays))
    }

    /// Builds a bundle from already parsed overlays.
    pub fn from_parts(
        credential_definition_id: &str,
        capture_base: Option<CaptureBase>,
        overlays: Vec<Overlay>,
    ) -> Self {
        let mut bundle = Self {
            credential_definition_id: credential_definition_id.to_string(),
            capture_base,
            overlays,
            languages: Vec::new(),
            metadata: BundleMetadata::default(),
            attributes: Vec::new(),
            attribute_positions: HashMap::new(),
            flagged_attributes: Vec::new(),
        };
        bundle.languages = bundle.collect_languages();
        bundle.metadata = bundle.collect_metadata();
        bundle.attributes = bundle.collect_attributes();
        bundle.attribute_positions = bundle
            .attributes
            .iter()
            .enumerate()
            .map(|(position, attribute)| (attribute.name.clone(), position))
            .collect();
        bundle.flagged_attributes = match &bundle.capture_base {
            Some(capture_base) => bundle
                .attributes
                .iter()
                .filter(|attribute| capture_base.is_flagged(&attribute.name))
                .map(|attribute| attribute.name.clone())
                .collect(),
            None => Vec::new(),
        };
        bundle
    }

    /// Returns a copy with fallback branding of both revisions appended.
    ///
    /// Used for cached bundles published without any branding overlay. The
    /// capture base digest is used as the overlays' capture base reference.
    pub fn with_fallback_branding(self, color: &str) -> Self {
        let reference = self
            .capture_base
            .as_ref()
            .and_then(|capture_base| capture_base.digest.clone())
            .unwrap_or_default();
        let Self {
            credential_definition_id,
            capture_base,
            mut overlays,
            ..
        } = self;
        overlays.push(Overlay::LegacyBranding(LegacyBrandingOverlay::with_color(
            reference.clone(),
            color,
        )));
        overlays.push(Overlay::Branding(BrandingOverlay::with_color(reference, color)));
        Self::from_parts(&credential_definition_id, capture_base, overlays)
    }

    pub fn credential_definition_id(&self) -> &str {
        &self.credential_definition_id
    }

    pub fn capture_base(&self) -> Option<&CaptureBase> {
        self.capture_base.as_ref()
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Distinct languages of the bundle's Meta overlays, sorted.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Attributes in capture-base order.
    pub fn attributes(&self) -> &[BundleAttribute] {
        &self.attributes
    }

    pub fn get_attribute(&self, name: &str) -> Option<&BundleAttribute> {
        self.attribute_positions
            .get(name)
            .and_then(|&position| self.attributes.get(position))
    }

    /// Attributes flagged as holding personal data.
    pub fn flagged_attributes(&self) -> impl Iterator<Item = &BundleAttribute> {
        self.flagged_attributes
            .iter()
            .filter_map(move |name| self.get_attribute(name))
    }

    pub fn get_flagged_attribute(&self, name: &str) -> Option<&BundleAttribute> {
        self.flagged_attributes
            .iter()
            .any(|flagged| flagged == name)
            .then(|| self.get_attribute(name))
            .flatten()
    }

    /// First current-revision branding overlay.
    pub fn branding(&self) -> Option<&BrandingOverlay> {
        self.overlays.iter().find_map(|overlay| match overlay {
            Overlay::Branding(branding) => Some(branding),
            _ => None,
        })
    }

    /// Whether the bundle carries branding of either revision.
    pub fn has_branding(&self) -> bool {
        self.overlays
            .iter()
            .any(|overlay| overlay.kind().map_or(false, OverlayKind::is_branding))
    }

    /// Overlays of one family, in bundle order.
    pub fn overlays_of(&self, kind: OverlayKind) -> impl Iterator<Item = &Overlay> {
        self.overlays
            .iter()
            .filter(move |overlay| overlay.kind() == Some(kind))
    }

    fn meta_overlays(&self) -> impl Iterator<Item = &MetaOverlay> {
        self.overlays.iter().filter_map(|overlay| match overlay {
            Overlay::Meta(meta) => Some(meta),
            _ => None,
        })
    }

    fn collect_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for language in self.meta_overlays().filter_map(|meta| meta.language.as_deref()) {
            if !language.is_empty() && !languages.iter().any(|known| known == language) {
                languages.push(language.to_string());
            }
        }
        languages.sort();
        languages
    }

    fn collect_metadata(&self) -> BundleMetadata {
        let mut metadata = BundleMetadata::default();
        for meta in self.meta_overlays() {
            metadata.absorb(meta);
        }
        metadata
    }

    fn collect_attributes(&self) -> Vec<BundleAttribute> {
        let Some(capture_base) = &self.capture_base else {
            return Vec::new();
        };
        capture_base
            .attributes
            .iter()
            .map(|(name, attribute_type)| self.describe_attribute(name, attribute_type))
            .collect()
    }

    fn describe_attribute(&self, name: &str, attribute_type: &str) -> BundleAttribute {
        let mut attribute = BundleAttribute {
            name: name.to_string(),
            attribute_type: attribute_type.to_string(),
            ..BundleAttribute::default()
        };

        for overlay in &self.overlays {
            let language = || {
                overlay
                    .language()
                    .unwrap_or(DEFAULT_BUNDLE_LANGUAGE)
                    .to_string()
            };
            match overlay {
                Overlay::Label(label) => {
                    if let Some(text) = non_empty(label.attribute_labels.get(name)) {
                        attribute.label.insert(language(), text);
                    }
                }
                Overlay::Information(information) => {
                    if let Some(text) = non_empty(information.attribute_information.get(name)) {
                        attribute.information.insert(language(), text);
                    }
                }
                Overlay::Format(format) if attribute.format.is_none() => {
                    attribute.format = non_empty(format.attribute_formats.get(name));
                }
                Overlay::CharacterEncoding(encoding) if attribute.character_encoding.is_none() => {
                    attribute.character_encoding =
                        non_empty(encoding.attribute_character_encoding.get(name));
                }
                Overlay::Standard(standard) if attribute.standard.is_none() => {
                    attribute.standard = non_empty(standard.attribute_standards.get(name));
                }
                _ => {}
            }
        }
        attribute
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::color::generate_color;
    use serde_json::json;

    fn student_card() -> RawOverlayBundle {
        serde_json::from_value(json!({
            "capture_base": {
                "type": "spec/capture_base/1.0",
                "classification": "",
                "attributes": {
                    "student_first_name": "Text",
                    "student_last_name": "Text",
                    "expiry_date_dateint": "DateInt"
                },
                "flagged_attributes": ["student_first_name"],
                "digest": "EBQbQEV6"
            },
            "overlays": [
                {"capture_base": "EBQbQEV6", "type": "aries/overlays/branding/1.0", "logo": "https://example.org/logo.png"},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/meta/1.0", "language": "fr", "name": "Carte étudiante", "issuer": "Collège"},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/meta/1.0", "language": "en", "name": "Student Card", "issuer": "College", "description": ""},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/label/1.0", "language": "en", "attribute_labels": {"student_first_name": "First Name"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/label/1.0", "language": "fr", "attribute_labels": {"student_first_name": "Prénom"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/information/1.0", "attribute_information": {"student_last_name": "Family name"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/format/1.0", "attribute_formats": {"expiry_date_dateint": "YYYYMMDD"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/character_encoding/1.0", "default_character_encoding": "utf-8", "attribute_character_encoding": {"student_first_name": "utf-8"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/standard/1.0", "attribute_standards": {"expiry_date_dateint": "urn:iso:8601"}},
                {"capture_base": "EBQbQEV6", "type": "spec/overlays/unit/1.0", "attribute_units": {}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_languages_are_distinct_and_sorted() {
        let mut raw = student_card();
        raw.overlays.push(json!({"type": "spec/overlays/meta/1.0", "language": "en", "name": "Duplicate"}));
        raw.overlays.push(json!({"type": "spec/overlays/meta/1.0", "language": "de", "name": "Studentenausweis"}));
        let bundle = OverlayBundle::new("cd", raw).unwrap();
        assert_eq!(bundle.languages(), &["de", "en", "fr"]);
    }

    #[test]
    fn test_get_attribute_defined_only_for_capture_base_names() {
        let bundle = OverlayBundle::new("cd", student_card()).unwrap();
        for name in ["student_first_name", "student_last_name", "expiry_date_dateint"] {
            assert_eq!(bundle.get_attribute(name).map(|a| a.name.as_str()), Some(name));
        }
        assert!(bundle.get_attribute("ghost").is_none());

        let first_name = bundle.get_attribute("student_first_name").unwrap();
        assert_eq!(first_name.label["en"], "First Name");
        assert_eq!(first_name.label["fr"], "Prénom");
        assert_eq!(first_name.character_encoding.as_deref(), Some("utf-8"));

        let last_name = bundle.get_attribute("student_last_name").unwrap();
        assert_eq!(last_name.information["en"], "Family name");

        let expiry = bundle.get_attribute("expiry_date_dateint").unwrap();
        assert_eq!(expiry.attribute_type, "DateInt");
        assert_eq!(expiry.format.as_deref(), Some("YYYYMMDD"));
        assert_eq!(expiry.standard.as_deref(), Some("urn:iso:8601"));
    }

    #[test]
    fn test_metadata_skips_empty_values() {
        let bundle = OverlayBundle::new("cd", student_card()).unwrap();
        let metadata = bundle.metadata();
        assert_eq!(metadata.name["en"], "Student Card");
        assert_eq!(metadata.name["fr"], "Carte étudiante");
        assert_eq!(metadata.issuer["fr"], "Collège");
        assert!(metadata.description.is_empty());
    }

    #[test]
    fn test_flagged_attributes() {
        let bundle = OverlayBundle::new("cd", student_card()).unwrap();
        let flagged: Vec<&str> = bundle.flagged_attributes().map(|a| a.name.as_str()).collect();
        assert_eq!(flagged, vec!["student_first_name"]);
        assert!(bundle.get_flagged_attribute("student_first_name").is_some());
        assert!(bundle.get_flagged_attribute("student_last_name").is_none());
    }

    #[test]
    fn test_branding_parsed_last_and_unknown_preserved() {
        let bundle = OverlayBundle::new("cred-def", student_card()).unwrap();
        let last = bundle.overlays().last().unwrap();
        assert_eq!(last.kind(), Some(OverlayKind::Branding));

        let branding = bundle.branding().unwrap();
        assert_eq!(branding.logo.as_deref(), Some("https://example.org/logo.png"));
        assert_eq!(
            branding.primary_background_color,
            Some(generate_color("cred-def"))
        );
        assert!(bundle
            .overlays()
            .iter()
            .any(|overlay| overlay.type_tag() == "spec/overlays/unit/1.0"));
    }

    #[test]
    fn test_fallback_branding_uses_capture_base_digest() {
        let mut raw = student_card();
        raw.overlays.retain(|overlay| raw_type_tag(overlay) != Some("aries/overlays/branding/1.0"));
        let bundle = OverlayBundle::new("cd", raw).unwrap();
        assert!(!bundle.has_branding());

        let bundle = bundle.with_fallback_branding("#112233");
        assert!(bundle.has_branding());
        assert_eq!(bundle.overlays_of(OverlayKind::LegacyBranding).count(), 1);
        let branding = bundle.branding().unwrap();
        assert_eq!(branding.base.capture_base, "EBQbQEV6");
        assert_eq!(branding.primary_background_color.as_deref(), Some("#112233"));
        assert_eq!(bundle.attributes().len(), 3);
    }

    #[test]
    fn test_missing_capture_base_has_no_attributes() {
        let raw: RawOverlayBundle = serde_json::from_value(json!({"overlays": []})).unwrap();
        let bundle = OverlayBundle::new("cd", raw).unwrap();
        assert!(bundle.capture_base().is_none());
        assert!(bundle.attributes().is_empty());
    }

    #[test]
    fn test_malformed_overlay_fails_construction() {
        let mut raw = student_card();
        raw.overlays.push(json!({"type": "spec/overlays/label/1.0", "attribute_labels": "nope"}));
        assert!(OverlayBundle::new("cd", raw).is_err());
    }
}
