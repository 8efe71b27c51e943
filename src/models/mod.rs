// src/models/mod.rs
//! Data structures: identifiers, capture bases, overlays, bundles and the
//! remote bundle index.

pub mod bundle;
pub mod capture_base;
pub mod identifiers;
pub mod index;
pub mod overlay;
