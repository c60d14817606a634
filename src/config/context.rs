// src/config/context.rs

//! Immutable per-build context.
//!
//! All components receive an [`OrchestratorContext`] instead of reaching for
//! shared mutable configuration. The dev dispatcher calls
//! [`OrchestratorContext::reload`] at the start of every iteration and gets a
//! *fresh* snapshot; a rebuild that is already in flight keeps reading the
//! old value, so a concurrent config edit can never alias into it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::loader::load_and_validate;
use crate::config::model::{BuildMode, ManifestVersion, ProjectConfig, TargetBrowser};
use crate::errors::{ExtkitError, Result};

/// CLI-level overrides folded into every context snapshot.
///
/// These survive config reloads: editing `Extkit.toml` while `extkit dev -b
/// firefox` is running must not silently flip the target browser back.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub browser: Option<TargetBrowser>,
    pub manifest_version: Option<ManifestVersion>,
    pub mode: Option<BuildMode>,
    pub filter_entrypoints: Vec<String>,
    pub analyze: bool,
    /// True for `extkit dev`: enables the virtual background entrypoint and
    /// the dev-only manifest additions.
    pub serve: bool,
}

/// Resolved, immutable view of one build's configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorContext {
    pub config: ProjectConfig,
    /// Absolute path of the loaded config file.
    pub config_path: PathBuf,
    /// Project root: the directory containing the config file.
    pub root: PathBuf,
    pub browser: TargetBrowser,
    pub manifest_version: ManifestVersion,
    pub mode: BuildMode,
    overrides: ContextOverrides,
}

impl OrchestratorContext {
    /// Load the config at `config_path` and resolve it against `overrides`.
    pub fn load(config_path: impl Into<PathBuf>, overrides: ContextOverrides) -> Result<Self> {
        let config_path: PathBuf = config_path.into();
        let config_path = config_path
            .canonicalize()
            .map_err(|e| ExtkitError::ConfigError(format!("config file {config_path:?}: {e}")))?;
        let config = load_and_validate(&config_path)?;
        Self::from_parts(config, config_path, overrides)
    }

    /// Resolve an already-validated config into a context.
    pub fn from_parts(
        config: ProjectConfig,
        config_path: PathBuf,
        overrides: ContextOverrides,
    ) -> Result<Self> {
        let root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };

        let browser = match overrides.browser {
            Some(b) => b,
            None => match &config.build.browser {
                Some(s) => TargetBrowser::from_str(s).map_err(ExtkitError::ConfigError)?,
                None => TargetBrowser::default(),
            },
        };

        let manifest_version = overrides.manifest_version.unwrap_or_else(|| {
            match config.build.manifest_version {
                Some(2) => ManifestVersion::V2,
                // Firefox still defaults to MV2; everything else to MV3.
                None if browser.is_firefox() => ManifestVersion::V2,
                _ => ManifestVersion::V3,
            }
        });

        let mode = overrides.mode.unwrap_or(if overrides.serve {
            BuildMode::Development
        } else {
            BuildMode::Production
        });

        Ok(Self {
            config,
            config_path,
            root,
            browser,
            manifest_version,
            mode,
            overrides,
        })
    }

    /// Re-read the config file and return a new immutable snapshot with the
    /// same CLI overrides.
    pub fn reload(&self) -> Result<Self> {
        let config = load_and_validate(&self.config_path)?;
        Self::from_parts(config, self.config_path.clone(), self.overrides.clone())
    }

    pub fn is_serve(&self) -> bool {
        self.overrides.serve
    }

    pub fn analyze(&self) -> bool {
        self.overrides.analyze
    }

    pub fn filter_entrypoints(&self) -> &[String] {
        &self.overrides.filter_entrypoints
    }

    /// Absolute entrypoints directory.
    pub fn entrypoints_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.entrypoints_dir)
    }

    /// Absolute public/static directory.
    pub fn public_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.public_dir)
    }

    /// Absolute output directory for this target, e.g. `.output/chrome-mv3`.
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.out_dir).join(format!(
            "{}-mv{}",
            self.browser.as_str(),
            self.manifest_version.as_u64()
        ))
    }

    /// Absolute runner config file, if one is configured.
    pub fn runner_config_file(&self) -> Option<PathBuf> {
        self.config
            .runner
            .config_file
            .as_ref()
            .map(|p| self.root.join(p))
    }

    /// Origin of the dev server, e.g. `http://localhost:3000`.
    pub fn dev_server_origin(&self) -> String {
        format!("http://localhost:{}", self.config.dev.port)
    }

    /// Debounce window for the reload dispatcher.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.dev.debounce_ms)
    }

    /// Whether `path` is the config file driving this context.
    pub fn is_config_file(&self, path: &Path) -> bool {
        path == self.config_path
    }
}
