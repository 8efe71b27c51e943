// src/lib.rs

//! # OCA Resolver
//!
//! Resolution and synchronization engine for Overlay Capture Architecture
//! (OCA) bundles, the metadata used to render verifiable credentials.
//!
//! ## Architecture Overview
//! 1. **Data Model**: capture bases, typed overlays and the derived
//!    [`models::bundle::OverlayBundle`]
//! 2. **Accessor**: [`resolver::accessor::OcaBundle`] applies language and
//!    branding preferences
//! 3. **Resolvers**: [`resolver::default::DefaultOcaBundleResolver`] over
//!    static bundles, [`resolver::remote::RemoteOcaBundleResolver`] over a
//!    synchronized local mirror of a remote bundle index
//! 4. **Storage**: content-addressed local file cache
//!
//! Consumers depend on the [`OcaBundleResolver`] trait and receive a resolver
//! constructed once by the application.

pub mod config;
pub mod error;
pub mod models;
pub mod resolver;
pub mod storage;
pub mod utils;

pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use models::identifiers::{Field, Identifiers, Meta};
pub use resolver::accessor::{Branding, OcaBundle, ResolverOptions};
pub use resolver::default::{CredentialOverlay, DefaultOcaBundleResolver, OcaBundleResolver};
pub use resolver::remote::{RemoteOcaBundleResolver, SyncOutcome, SyncState};
