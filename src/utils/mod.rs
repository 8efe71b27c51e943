// src/utils/mod.rs
//! Helper functions shared by the data model and the resolvers.

pub mod color;
pub mod cred_def;
pub mod crypto;
pub mod serialization;
