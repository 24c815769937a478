// src/config/mod.rs

//! Script descriptor loading.
//!
//! - [`model`] defines the JSON-backed `ScriptDescriptor`.
//! - [`loader`] reads it from disk, tolerating a UTF-8 BOM.

pub mod loader;
pub mod model;

pub use loader::{default_script_path, load_from_path, parse_descriptor, strip_bom};
pub use model::ScriptDescriptor;
