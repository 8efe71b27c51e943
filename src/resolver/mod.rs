// src/resolver/mod.rs
//! Bundle resolution: the accessor handed to consumers, the in-memory
//! resolver and the remote resolver with its synchronization engine.

pub mod accessor;
pub mod default;
pub mod remote;
pub mod sync;
