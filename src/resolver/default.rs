// src/resolver/default.rs
//! In-memory bundle resolution.
//!
//! [`OcaBundleResolver`] is the seam consumers depend on; they receive an
//! `Arc<dyn OcaBundleResolver>` from the composition root. Only `resolve` is
//! resolver specific. Default bundle synthesis, presentation field enrichment
//! and the combined `resolve_all_bundles` are provided on top of it.

use crate::models::bundle::{OverlayBundle, RawOverlayBundle};
use crate::models::capture_base::CaptureBase;
use crate::models::identifiers::{Field, Identifiers, Meta};
use crate::models::overlay::{
    BaseOverlay, BrandingOverlay, BrandingRevision, LegacyBrandingOverlay, MetaOverlay, Overlay,
    OverlayKind,
};
use crate::resolver::accessor::{Branding, OcaBundle, ResolverOptions};
use crate::utils::color::generate_color;
use crate::utils::cred_def::{parse_cred_def_from_id, start_case};
use async_trait::async_trait;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Issuer shown on synthesized bundles when nothing better is known.
pub const UNKNOWN_CONTACT: &str = "Unknown Contact";

/// Seed for the default card color when neither name nor issuer is known.
const DEFAULT_COLOR_SEED: &str = "default";

/// One slot of the in-memory bundle registry.
#[derive(Debug, Clone)]
pub enum BundleEntry {
    Bundle(Arc<OverlayBundle>),
    /// Points at another registry key; followed exactly one hop.
    AliasOf(String),
}

/// Static bundle data a resolver is constructed with.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum BundleData {
    Alias(String),
    Bundle(RawOverlayBundle),
}

/// Everything a credential card needs, as returned by
/// [`OcaBundleResolver::resolve_all_bundles`].
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOverlay {
    #[serde(skip)]
    pub bundle: OcaBundle,
    pub presentation_fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_overlay: Option<MetaOverlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding_overlay: Option<Branding>,
}

/// Resolves identifiers to overlay bundles.
#[async_trait]
pub trait OcaBundleResolver: Send + Sync {
    /// Language and branding preferences of this resolver.
    fn options(&self) -> &ResolverOptions;

    fn branding_revision(&self) -> BrandingRevision {
        self.options().branding_revision
    }

    /// Finds the bundle for a credential.
    ///
    /// # Arguments
    /// * `identifiers` - Credential definition, schema and template ids
    /// * `language` - Preferred language; the resolver default when `None`
    ///
    /// # Returns
    /// The bundle, or `None` when no bundle is known for any identifier
    async fn resolve(&self, identifiers: &Identifiers, language: Option<&str>) -> Option<OcaBundle>;

    /// Synthesizes a bundle for a credential without published branding.
    async fn resolve_default_bundle(
        &self,
        identifiers: &Identifiers,
        meta: Option<&Meta>,
        language: Option<&str>,
    ) -> OcaBundle {
        default_bundle(identifiers, meta, &self.options().for_language(language))
    }

    /// Filters and annotates the caller's attribute list with bundle data.
    ///
    /// When a bundle with capture-base attributes resolves, only fields named
    /// in the capture base are kept and each one gets its label, format, type
    /// and encoding. Otherwise the list is returned unchanged.
    async fn presentation_fields(
        &self,
        identifiers: &Identifiers,
        attributes: &[Field],
        language: Option<&str>,
    ) -> Vec<Field> {
        let Some(bundle) = self.resolve(identifiers, language).await else {
            return attributes.to_vec();
        };
        annotate_fields(&bundle, attributes)
    }

    /// Resolves the specific and the default bundle concurrently and bundles
    /// up what a credential card renders.
    ///
    /// The specific bundle wins when present. A caller-supplied `meta.logo`
    /// replaces the logo of current-revision branding.
    async fn resolve_all_bundles(
        &self,
        identifiers: &Identifiers,
        attributes: Option<&[Field]>,
        meta: Option<&Meta>,
        language: Option<&str>,
    ) -> CredentialOverlay {
        let (specific, fallback) = futures::join!(
            self.resolve(identifiers, language),
            self.resolve_default_bundle(identifiers, meta, language)
        );

        let presentation_fields = match attributes {
            Some(attributes) => match &specific {
                Some(bundle) => annotate_fields(bundle, attributes),
                None => attributes.to_vec(),
            },
            None => Vec::new(),
        };

        let bundle = specific.unwrap_or(fallback);
        let meta_overlay = bundle.meta_overlay().cloned();
        let mut branding_overlay = bundle.branding_overlay();
        if let (Some(branding), Some(meta)) = (branding_overlay.as_mut(), meta) {
            if branding.has_logo_field() {
                branding.set_logo(meta.logo.clone());
            }
        }

        CredentialOverlay {
            bundle,
            presentation_fields,
            meta_overlay,
            branding_overlay,
        }
    }
}

fn annotate_fields(bundle: &OcaBundle, attributes: &[Field]) -> Vec<Field> {
    let capture_base = match bundle.capture_base() {
        Ok(capture_base) if !capture_base.attributes.is_empty() => capture_base,
        _ => return attributes.to_vec(),
    };
    let labels = bundle.label_overlay().map(|label| &label.attribute_labels);
    let formats = bundle.format_overlay().map(|format| &format.attribute_formats);
    let encodings = bundle
        .character_encoding_overlay()
        .map(|encoding| &encoding.attribute_character_encoding);

    attributes
        .iter()
        .filter_map(|field| {
            let name = field.name.as_deref()?;
            let attribute_type = capture_base.attribute_type(name)?;
            let mut field = field.clone();
            field.label = labels.and_then(|labels| labels.get(name)).cloned();
            field.format = formats.and_then(|formats| formats.get(name)).cloned();
            field.field_type = Some(attribute_type.to_string());
            field.encoding = encodings.and_then(|encodings| encodings.get(name)).cloned();
            Some(field)
        })
        .collect()
}

/// Builds the ephemeral fallback bundle for a credential.
///
/// The name comes from `meta.cred_name` or is parsed from the credential
/// definition id; the issuer from the connection alias or id. The card color
/// is derived from the name (or the issuer) so it is stable across runs.
/// The result is never cached.
pub fn default_bundle(
    identifiers: &Identifiers,
    meta: Option<&Meta>,
    options: &ResolverOptions,
) -> OcaBundle {
    let name = start_case(&match meta.and_then(|meta| meta.cred_name.as_deref()) {
        Some(cred_name) => cred_name.to_string(),
        None => parse_cred_def_from_id(
            identifiers.credential_definition_id.as_deref(),
            identifiers.schema_id.as_deref(),
        ),
    });
    let issuer = meta
        .and_then(|meta| {
            [meta.alias.as_deref(), meta.cred_connection_id.as_deref()]
                .into_iter()
                .flatten()
                .find(|candidate| !candidate.is_empty())
        })
        .unwrap_or(UNKNOWN_CONTACT)
        .to_string();

    let color_seed = [name.as_str(), issuer.as_str()]
        .into_iter()
        .find(|seed| !seed.is_empty())
        .unwrap_or(DEFAULT_COLOR_SEED);
    let color = generate_color(color_seed);

    let meta_overlay = MetaOverlay {
        base: BaseOverlay::of_kind(OverlayKind::Meta, ""),
        language: Some(options.language.clone()),
        name: Some(name),
        issuer: Some(issuer),
        description: Some(String::new()),
        issuer_description: Some(String::new()),
        issuer_url: Some(String::new()),
        credential_help_text: Some(String::new()),
        credential_support_url: Some(String::new()),
        watermark: None,
    };
    let branding = match options.branding_revision {
        BrandingRevision::Legacy => Overlay::LegacyBranding(LegacyBrandingOverlay::with_color("", color)),
        BrandingRevision::Current => Overlay::Branding(BrandingOverlay::with_color("", color)),
    };

    let bundle = OverlayBundle::from_parts(
        identifiers.credential_definition_id.as_deref().unwrap_or_default(),
        Some(CaptureBase::empty()),
        vec![Overlay::Meta(meta_overlay), branding],
    );
    OcaBundle::new(Arc::new(bundle), options.clone())
}

/// Resolver over a fixed set of bundles and aliases.
#[derive(Debug, Clone, Default)]
pub struct DefaultOcaBundleResolver {
    bundles: HashMap<String, BundleEntry>,
    options: ResolverOptions,
}

impl DefaultOcaBundleResolver {
    /// Parses the given bundles; entries that fail to parse are logged and
    /// skipped.
    ///
    /// # Arguments
    /// * `bundles` - Identifier to raw bundle (or alias identifier) pairs
    /// * `options` - Language and branding preferences
    pub fn new(
        bundles: impl IntoIterator<Item = (String, BundleData)>,
        options: ResolverOptions,
    ) -> Self {
        let mut entries = HashMap::new();
        for (identifier, data) in bundles {
            match data {
                BundleData::Alias(target) => {
                    entries.insert(identifier, BundleEntry::AliasOf(target));
                }
                BundleData::Bundle(raw) => match OverlayBundle::new(&identifier, raw) {
                    Ok(bundle) => {
                        entries.insert(identifier, BundleEntry::Bundle(Arc::new(bundle)));
                    }
                    Err(e) => error!("Error parsing bundle for {}: {}", identifier, e),
                },
            }
        }
        Self {
            bundles: entries,
            options,
        }
    }

    /// A resolver with no static bundles.
    pub fn empty(options: ResolverOptions) -> Self {
        Self {
            bundles: HashMap::new(),
            options,
        }
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Finds the registered bundle for the first identifier with an entry.
    ///
    /// Aliases are followed one hop; an alias to another alias or to a
    /// missing key resolves to `None`.
    pub fn lookup(&self, identifiers: &Identifiers) -> Option<Arc<OverlayBundle>> {
        let (key, entry) = identifiers
            .ordered()
            .find_map(|key| self.bundles.get(key).map(|entry| (key, entry)))?;
        match entry {
            BundleEntry::Bundle(bundle) => Some(bundle.clone()),
            BundleEntry::AliasOf(target) => match self.bundles.get(target) {
                Some(BundleEntry::Bundle(bundle)) => Some(bundle.clone()),
                Some(BundleEntry::AliasOf(_)) => {
                    warn!("Alias {} points at another alias {}", key, target);
                    None
                }
                None => {
                    warn!("Alias {} points at unknown bundle {}", key, target);
                    None
                }
            },
        }
    }
}

#[async_trait]
impl OcaBundleResolver for DefaultOcaBundleResolver {
    fn options(&self) -> &ResolverOptions {
        &self.options
    }

    async fn resolve(&self, identifiers: &Identifiers, language: Option<&str>) -> Option<OcaBundle> {
        let bundle = self.lookup(identifiers)?;
        Some(OcaBundle::new(bundle, self.options.for_language(language)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STUDENT_CRED_DEF: &str = "Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:student_card";
    const STUDENT_SCHEMA: &str = "Q6ZyHkUwPGRpJNv1Ut2Axs:2:student_card:1.0";

    fn email_bundle() -> BundleData {
        serde_json::from_value(json!({
            "capture_base": {
                "type": "spec/capture_base/1.0",
                "attributes": {"email": "Text"},
                "digest": "cb"
            },
            "overlays": [
                {"type": "spec/overlays/meta/1.0", "language": "en", "name": "Email Card", "issuer": "Mail Co"},
                {"type": "spec/overlays/label/1.0", "language": "en", "attribute_labels": {"email": "Email Address"}},
                {"type": "spec/overlays/format/1.0", "attribute_formats": {"email": "email"}},
                {"type": "spec/overlays/character_encoding/1.0", "attribute_character_encoding": {"email": "utf-8"}},
                {"type": "aries/overlays/branding/1.0", "logo": "https://mail.example/logo.png", "primary_background_color": "#0a0a0a"}
            ]
        }))
        .unwrap()
    }

    fn resolver() -> DefaultOcaBundleResolver {
        DefaultOcaBundleResolver::new(
            vec![
                (STUDENT_CRED_DEF.to_string(), email_bundle()),
                ("alias-id".to_string(), BundleData::Alias(STUDENT_CRED_DEF.to_string())),
                ("alias-of-alias".to_string(), BundleData::Alias("alias-id".to_string())),
                ("dangling".to_string(), BundleData::Alias("missing".to_string())),
            ],
            ResolverOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_resolve_prefers_credential_definition() {
        let resolver = resolver();
        let ids = Identifiers::for_credential_definition(STUDENT_CRED_DEF).with_schema_id("unknown");
        let bundle = resolver.resolve(&ids, Some("fr")).await.unwrap();
        assert_eq!(bundle.bundle().credential_definition_id(), STUDENT_CRED_DEF);
        assert_eq!(bundle.language(), "fr");

        let ids = Identifiers::default().with_template_id(STUDENT_CRED_DEF);
        assert!(resolver.resolve(&ids, None).await.is_some());

        assert!(resolver
            .resolve(&Identifiers::for_credential_definition("nope"), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_alias_followed_exactly_one_hop() {
        let resolver = resolver();
        let via_alias = resolver
            .resolve(&Identifiers::default().with_schema_id("alias-id"), None)
            .await
            .unwrap();
        assert_eq!(via_alias.bundle().credential_definition_id(), STUDENT_CRED_DEF);

        assert!(resolver
            .resolve(&Identifiers::default().with_schema_id("alias-of-alias"), None)
            .await
            .is_none());
        assert!(resolver
            .resolve(&Identifiers::for_credential_definition("dangling"), None)
            .await
            .is_none());
    }

    #[test]
    fn test_unparseable_bundles_are_skipped() {
        let broken: BundleData = serde_json::from_value(json!({
            "capture_base": {"attributes": {}},
            "overlays": [{"type": "spec/overlays/format/1.0", "attribute_formats": 42}]
        }))
        .unwrap();
        let resolver = DefaultOcaBundleResolver::new(
            vec![("broken".to_string(), broken), ("ok".to_string(), email_bundle())],
            ResolverOptions::default(),
        );
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_presentation_fields_filters_and_annotates() {
        let resolver = resolver();
        let ids = Identifiers::for_credential_definition(STUDENT_CRED_DEF);
        let fields = resolver
            .presentation_fields(
                &ids,
                &[Field::named("email").with_value("a@b.c"), Field::named("ghost")],
                None,
            )
            .await;

        assert_eq!(fields.len(), 1);
        let email = &fields[0];
        assert_eq!(email.name.as_deref(), Some("email"));
        assert_eq!(email.value.as_deref(), Some("a@b.c"));
        assert_eq!(email.label.as_deref(), Some("Email Address"));
        assert_eq!(email.format.as_deref(), Some("email"));
        assert_eq!(email.field_type.as_deref(), Some("Text"));
        assert_eq!(email.encoding.as_deref(), Some("utf-8"));
    }

    #[tokio::test]
    async fn test_presentation_fields_unchanged_without_bundle() {
        let resolver = resolver();
        let attributes = vec![Field::named("email"), Field::named("ghost")];
        let fields = resolver
            .presentation_fields(&Identifiers::for_credential_definition("nope"), &attributes, None)
            .await;
        assert_eq!(fields, attributes);
    }

    #[tokio::test]
    async fn test_default_bundle_name_and_color() {
        let resolver = DefaultOcaBundleResolver::empty(ResolverOptions::default());
        let ids = Identifiers::for_credential_definition(STUDENT_CRED_DEF);
        let bundle = resolver.resolve_default_bundle(&ids, None, None).await;

        let meta = bundle.meta_overlay().unwrap();
        assert_eq!(meta.name.as_deref(), Some("Student Card"));
        assert_eq!(meta.issuer.as_deref(), Some(UNKNOWN_CONTACT));
        let branding = bundle.branding_overlay().unwrap();
        assert_eq!(branding.revision(), BrandingRevision::Current);
        assert_eq!(branding.background_color(), Some("#602809"));
        assert_eq!(branding.background_color().map(String::from), Some(generate_color("Student Card")));
        assert!(bundle.capture_base().unwrap().attributes.is_empty());
    }

    #[tokio::test]
    async fn test_default_bundle_uses_meta_and_revision() {
        let resolver = DefaultOcaBundleResolver::empty(ResolverOptions {
            language: "fr".to_string(),
            branding_revision: BrandingRevision::Legacy,
        });
        let meta = Meta {
            alias: Some(String::new()),
            cred_connection_id: Some("conn-1".to_string()),
            cred_name: Some("employee id card".to_string()),
            logo: None,
        };
        let ids = Identifiers::for_credential_definition(STUDENT_CRED_DEF).with_schema_id(STUDENT_SCHEMA);
        let bundle = resolver.resolve_default_bundle(&ids, Some(&meta), None).await;

        assert_eq!(bundle.language(), "fr");
        let overlay = bundle.meta_overlay().unwrap();
        assert_eq!(overlay.name.as_deref(), Some("Employee Id Card"));
        assert_eq!(overlay.issuer.as_deref(), Some("conn-1"));
        let branding = bundle.branding_overlay().unwrap();
        assert_eq!(branding.revision(), BrandingRevision::Legacy);
        assert_eq!(
            branding.background_color().map(String::from),
            Some(generate_color("Employee Id Card"))
        );
    }

    #[tokio::test]
    async fn test_resolve_all_bundles_prefers_specific_and_overrides_logo() {
        let resolver = resolver();
        let ids = Identifiers::for_credential_definition(STUDENT_CRED_DEF);
        let meta = Meta {
            logo: Some("https://wallet.example/own.png".to_string()),
            ..Meta::default()
        };
        let attributes = vec![Field::named("email"), Field::named("ghost")];
        let overlay = resolver
            .resolve_all_bundles(&ids, Some(&attributes), Some(&meta), None)
            .await;

        assert_eq!(overlay.meta_overlay.unwrap().name.as_deref(), Some("Email Card"));
        assert_eq!(overlay.presentation_fields.len(), 1);
        match overlay.branding_overlay.unwrap() {
            Branding::Current(branding) => {
                assert_eq!(branding.logo.as_deref(), Some("https://wallet.example/own.png"));
                assert_eq!(branding.primary_background_color.as_deref(), Some("#0a0a0a"));
            }
            other => panic!("expected current branding, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_all_bundles_falls_back_to_default() {
        let resolver = resolver();
        let ids = Identifiers::for_credential_definition("Ab12:3:CL:9:default").with_schema_id("Ab12:2:member_card:1.0");
        let overlay = resolver.resolve_all_bundles(&ids, None, None, Some("en")).await;

        assert!(overlay.presentation_fields.is_empty());
        assert_eq!(overlay.meta_overlay.unwrap().name.as_deref(), Some("Member Card"));
        let branding = overlay.branding_overlay.unwrap();
        assert_eq!(branding.background_color().map(String::from), Some(generate_color("Member Card")));
    }

    #[test]
    fn test_resolver_is_injectable() {
        let resolver: Arc<dyn OcaBundleResolver> = Arc::new(resolver());
        let bundle = tokio_test::block_on(
            resolver.resolve(&Identifiers::for_credential_definition(STUDENT_CRED_DEF), None),
        );
        assert!(bundle.is_some());
        assert_eq!(resolver.branding_revision(), BrandingRevision::Current);
    }
}
