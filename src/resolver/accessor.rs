// src/resolver/accessor.rs
//! Read-only view over one overlay bundle with language and branding
//! preferences applied.

use crate::error::{Error, Result};
use crate::models::bundle::{OverlayBundle, DEFAULT_BUNDLE_LANGUAGE};
use crate::models::capture_base::CaptureBase;
use crate::models::overlay::{
    BaseOverlay, BrandingOverlay, BrandingRevision, CharacterEncodingOverlay, FormatOverlay,
    InformationOverlay, LabelOverlay, LegacyBrandingOverlay, MetaOverlay, Overlay, OverlayKind,
    StandardOverlay,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Presentation preferences a resolver applies to every bundle it hands out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub language: String,
    pub branding_revision: BrandingRevision,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_BUNDLE_LANGUAGE.to_string(),
            branding_revision: BrandingRevision::default(),
        }
    }
}

impl ResolverOptions {
    /// Same options with `language` replaced, if one is given.
    pub fn for_language(&self, language: Option<&str>) -> Self {
        Self {
            language: language
                .filter(|language| !language.is_empty())
                .unwrap_or(&self.language)
                .to_string(),
            branding_revision: self.branding_revision,
        }
    }
}

/// Branding overlay of either revision, detached from its bundle.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Branding {
    Current(BrandingOverlay),
    Legacy(LegacyBrandingOverlay),
}

impl Branding {
    pub fn revision(&self) -> BrandingRevision {
        match self {
            Branding::Current(_) => BrandingRevision::Current,
            Branding::Legacy(_) => BrandingRevision::Legacy,
        }
    }

    /// Only the current revision has a logo slot.
    pub fn has_logo_field(&self) -> bool {
        matches!(self, Branding::Current(_))
    }

    pub fn set_logo(&mut self, logo: Option<String>) {
        if let Branding::Current(branding) = self {
            branding.logo = logo;
        }
    }

    pub fn background_color(&self) -> Option<&str> {
        match self {
            Branding::Current(branding) => branding.primary_background_color.as_deref(),
            Branding::Legacy(branding) => branding.background_color.as_deref(),
        }
    }
}

/// A resolved bundle as handed to consumers.
///
/// Cloning is cheap: the bundle itself is shared.
#[derive(Debug, Clone)]
pub struct OcaBundle {
    bundle: Arc<OverlayBundle>,
    options: ResolverOptions,
}

impl OcaBundle {
    pub fn new(bundle: Arc<OverlayBundle>, options: ResolverOptions) -> Self {
        Self { bundle, options }
    }

    pub fn bundle(&self) -> &OverlayBundle {
        &self.bundle
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn language(&self) -> &str {
        &self.options.language
    }

    /// The bundle's capture base.
    ///
    /// # Errors
    /// [`Error::MissingCaptureBase`] when the bundle has none; such a bundle is
    /// structurally invalid.
    pub fn capture_base(&self) -> Result<&CaptureBase> {
        self.bundle.capture_base().ok_or(Error::MissingCaptureBase)
    }

    pub fn meta_overlay(&self) -> Option<&MetaOverlay> {
        match self.overlay(OverlayKind::Meta)? {
            Overlay::Meta(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn label_overlay(&self) -> Option<&LabelOverlay> {
        match self.overlay(OverlayKind::Label)? {
            Overlay::Label(label) => Some(label),
            _ => None,
        }
    }

    pub fn information_overlay(&self) -> Option<&InformationOverlay> {
        match self.overlay(OverlayKind::Information)? {
            Overlay::Information(information) => Some(information),
            _ => None,
        }
    }

    pub fn format_overlay(&self) -> Option<&FormatOverlay> {
        match self.overlay(OverlayKind::Format)? {
            Overlay::Format(format) => Some(format),
            _ => None,
        }
    }

    pub fn character_encoding_overlay(&self) -> Option<&CharacterEncodingOverlay> {
        match self.overlay(OverlayKind::CharacterEncoding)? {
            Overlay::CharacterEncoding(encoding) => Some(encoding),
            _ => None,
        }
    }

    pub fn standard_overlay(&self) -> Option<&StandardOverlay> {
        match self.overlay(OverlayKind::Standard)? {
            Overlay::Standard(standard) => Some(standard),
            _ => None,
        }
    }

    /// Branding of the preferred revision, or of the other revision when the
    /// bundle lacks the preferred one.
    pub fn branding_overlay(&self) -> Option<Branding> {
        let preferred = self.options.branding_revision;
        [preferred, preferred.other()]
            .into_iter()
            .find_map(|revision| match self.overlay(revision.kind())? {
                Overlay::Branding(branding) => Some(Branding::Current(branding.clone())),
                Overlay::LegacyBranding(branding) => Some(Branding::Legacy(branding.clone())),
                _ => None,
            })
    }

    /// Builds a Meta overlay with only a name and a language set.
    pub fn build_meta_overlay(&self, name: &str, language: &str) -> MetaOverlay {
        MetaOverlay {
            base: BaseOverlay::of_kind(OverlayKind::Meta, ""),
            language: Some(language.to_string()),
            name: Some(name.to_string()),
            description: Some(String::new()),
            issuer: Some(String::new()),
            issuer_description: Some(String::new()),
            issuer_url: Some(String::new()),
            credential_help_text: Some(String::new()),
            credential_support_url: Some(String::new()),
            watermark: None,
        }
    }

    /// Finds the overlay of `kind` for the configured language.
    ///
    /// Localized kinds match the language exactly, then fall back to an
    /// overlay without a language. An overlay in another language is never
    /// returned.
    fn overlay(&self, kind: OverlayKind) -> Option<&Overlay> {
        let mut candidates = self.bundle.overlays_of(kind);
        if !kind.is_localized() {
            return candidates.next();
        }
        let language = self.options.language.as_str();
        self.bundle
            .overlays_of(kind)
            .find(|overlay| overlay.language() == Some(language))
            .or_else(|| candidates.find(|overlay| overlay.language().is_none()))
    }
}
