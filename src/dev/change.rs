// src/dev/change.rs

//! Dev-mode change detection.
//!
//! Pure function from (changed paths, previous build output) to the minimal
//! reload action. No IO, no channels; extensively unit-testable on its own,
//! like the rest of the decision logic in this crate.

use std::path::{Path, PathBuf};

use crate::build::output::{BuildOutput, OutputFile};
use crate::entrypoint::{Entrypoint, EntrypointGroup};

/// The decision describing how to react to a batch of file edits.
///
/// Variants are mutually exclusive; when one batch would justify several,
/// the most disruptive wins.
#[derive(Debug, Clone, PartialEq)]
pub enum DevModeChange {
    /// Nothing in the previous output depends on the changed paths.
    NoChange,
    /// The build inputs themselves changed (config file); stop and restart
    /// the whole server. Decided upstream of [`detect_dev_changes`].
    FullRestart,
    /// The runner config changed; close and reopen just the browser.
    /// Decided upstream of [`detect_dev_changes`].
    BrowserRestart,
    /// Background (or a mixed set) changed; reload the whole extension.
    ExtensionReload {
        rebuild_groups: Vec<EntrypointGroup>,
        cached_output: BuildOutput,
    },
    /// Only HTML entrypoints changed; reload those pages in place.
    HtmlReload {
        rebuild_groups: Vec<EntrypointGroup>,
        cached_output: BuildOutput,
    },
    /// Only content scripts changed; re-register just those.
    ContentScriptReload {
        rebuild_groups: Vec<EntrypointGroup>,
        cached_output: BuildOutput,
    },
}

impl DevModeChange {
    pub fn kind_str(&self) -> &'static str {
        match self {
            DevModeChange::NoChange => "no-change",
            DevModeChange::FullRestart => "full-restart",
            DevModeChange::BrowserRestart => "browser-restart",
            DevModeChange::ExtensionReload { .. } => "extension-reload",
            DevModeChange::HtmlReload { .. } => "html-reload",
            DevModeChange::ContentScriptReload { .. } => "content-script-reload",
        }
    }
}

/// Decide the minimal reload action for a batch of changed paths.
///
/// A step is affected when any of its chunks lists a changed path among its
/// `module_ids`; a public asset is affected when a changed path ends with
/// its bundle-relative name. `previous = None` (no build yet) and an empty
/// affected set both mean [`DevModeChange::NoChange`].
pub fn detect_dev_changes(
    changed_paths: &[PathBuf],
    previous: Option<&BuildOutput>,
) -> DevModeChange {
    let Some(previous) = previous else {
        return DevModeChange::NoChange;
    };

    let (affected_steps, cached_steps): (Vec<_>, Vec<_>) = previous
        .steps
        .iter()
        .partition(|step| changed_paths.iter().any(|p| step.depends_on(p)));

    let (affected_assets, cached_assets): (Vec<_>, Vec<_>) = previous
        .public_assets
        .iter()
        .partition(|asset| is_asset_affected(asset, changed_paths));

    if affected_steps.is_empty() && affected_assets.is_empty() {
        return DevModeChange::NoChange;
    }

    let rebuild_groups: Vec<EntrypointGroup> = affected_steps
        .iter()
        .map(|s| s.entrypoints.clone())
        .collect();

    let cached_output = BuildOutput {
        manifest: previous.manifest.clone(),
        public_assets: cached_assets.into_iter().cloned().collect(),
        steps: cached_steps.into_iter().cloned().collect(),
    };

    let affected_entrypoints: Vec<&Entrypoint> = rebuild_groups
        .iter()
        .flat_map(|g| g.members())
        .collect();

    // Most disruptive wins across one batch. The background owns
    // extension-wide runtime state and cannot be hot-swapped; an affected
    // asset has no entrypoint of its own and also forces the full reload.
    let any_background = affected_entrypoints.iter().any(|e| e.is_background());
    let only_html = !affected_entrypoints.is_empty()
        && affected_entrypoints.iter().all(|e| e.is_html());
    let only_content_scripts = !affected_entrypoints.is_empty()
        && affected_entrypoints.iter().all(|e| e.is_content_script());

    if any_background || affected_entrypoints.is_empty() {
        DevModeChange::ExtensionReload {
            rebuild_groups,
            cached_output,
        }
    } else if only_html && affected_assets.is_empty() {
        DevModeChange::HtmlReload {
            rebuild_groups,
            cached_output,
        }
    } else if only_content_scripts && affected_assets.is_empty() {
        DevModeChange::ContentScriptReload {
            rebuild_groups,
            cached_output,
        }
    } else {
        // Mixed kinds (or entrypoints plus assets): the single-tag change
        // cannot express "both", so fall back to the conservative union.
        DevModeChange::ExtensionReload {
            rebuild_groups,
            cached_output,
        }
    }
}

fn is_asset_affected(asset: &OutputFile, changed_paths: &[PathBuf]) -> bool {
    let name = Path::new(asset.file_name());
    changed_paths.iter().any(|p| p.ends_with(name))
}
