// src/config/mod.rs

//! Project configuration (`Extkit.toml`).
//!
//! - [`model`] holds the serde model of the TOML file plus the small enums
//!   shared across the crate (target browser, manifest version, build mode).
//! - [`loader`] reads and validates a config file from disk.
//! - [`validate`] turns the raw deserialized form into a validated
//!   [`ProjectConfig`].
//! - [`context`] bundles a validated config with CLI overrides into an
//!   immutable [`OrchestratorContext`] snapshot threaded through every
//!   component. Reloading config produces a *new* snapshot; nothing global
//!   is mutated.

pub mod context;
pub mod loader;
pub mod model;
pub mod validate;

pub use context::{ContextOverrides, OrchestratorContext};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BuildMode, BuildSection, CommandsSection, DevSection, ManifestVersion, ProjectConfig,
    ProjectSection, RawProjectConfig, RunnerSection, TargetBrowser,
};
