// src/manifest/mod.rs

//! Manifest assembly.
//!
//! - [`version`] simplifies user versions into manifest-legal ones.
//! - [`icons`] discovers icon sizes among the public assets.
//! - [`content_scripts`] implements the content-script grouping
//!   sub-algorithm (canonical signature, merge, CSS lookup).
//! - [`assemble`] merges everything into the final manifest document.

pub mod assemble;
pub mod content_scripts;
pub mod icons;
pub mod version;

pub use assemble::assemble_manifest;
pub use content_scripts::{group_signature, resolve_options, ResolvedContentScript};
pub use version::simplify_version;
