// src/storage/mod.rs
//! Local persistence for synchronized bundle data.

pub mod file_cache;
