// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ProjectConfig, RawProjectConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawProjectConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (browser/manifest-version sanity, etc.). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawProjectConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run basic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - an unknown `[build].browser` value,
///   - an unsupported `[build].manifest_version`,
///   - a zero `[dev].debounce_ms`.
///
/// Higher-level modules then fold the result into an
/// [`crate::config::OrchestratorContext`] together with CLI overrides.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ProjectConfig::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Extkit.toml` in the current working
/// directory, but this function exists so you can later:
///
/// - Respect an env var (e.g. `EXTKIT_CONFIG`).
/// - Support project-local config discovery upward from subdirectories.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Extkit.toml")
}
