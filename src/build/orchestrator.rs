// src/build/orchestrator.rs

//! Build orchestration.
//!
//! [`internal_build`] runs the full pipeline: wipe the output directory,
//! classify, validate, group, then [`rebuild`] everything against an empty
//! prior output. Dev mode calls [`rebuild`] directly with the groups and
//! cached output decided by the change detector.

use std::path::Path;

use tracing::{debug, info};

use crate::build::backend::BuilderBackend;
use crate::build::output::{BuildOutput, BuildStepOutput, OutputFile};
use crate::config::OrchestratorContext;
use crate::entrypoint::{
    classify_entrypoints, group_entrypoints, validate_entrypoints, Entrypoint, EntrypointGroup,
    ModuleConfigReader,
};
use crate::errors::{ExtkitError, Result};
use crate::manifest::assemble_manifest;

/// Result of a full build: the classified entrypoints plus the output.
///
/// Dev mode keeps the entrypoint list around to drive later partial
/// rebuilds with stable ordering.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub entrypoints: Vec<Entrypoint>,
    pub output: BuildOutput,
}

/// Run a complete build from scratch.
pub async fn internal_build(
    ctx: &OrchestratorContext,
    builder: &dyn BuilderBackend,
    reader: &dyn ModuleConfigReader,
) -> Result<BuildResult> {
    wipe_out_dir(&ctx.out_dir())?;

    let entrypoints = classify_entrypoints(ctx, reader).await?;
    validate_entrypoints(&entrypoints)?;

    let groups = group_entrypoints(&entrypoints);
    info!(
        entrypoints = entrypoints.iter().filter(|e| !e.skipped).count(),
        groups = groups.len(),
        "starting build"
    );

    let output = rebuild(ctx, builder, &entrypoints, groups, BuildOutput::empty()).await?;
    Ok(BuildResult {
        entrypoints,
        output,
    })
}

/// Build `groups_to_build` and merge the results with `previous`.
///
/// Groups are built **sequentially**: build order fixes manifest field and
/// log ordering, and later steps may assume shared chunks from earlier steps
/// exist on disk. Any Builder error aborts the whole rebuild, naming the
/// failing group.
///
/// Callers are responsible for ensuring `previous` excludes any step being
/// rebuilt — this function never deduplicates steps itself.
pub async fn rebuild(
    ctx: &OrchestratorContext,
    builder: &dyn BuilderBackend,
    all_entrypoints: &[Entrypoint],
    groups_to_build: Vec<EntrypointGroup>,
    previous: BuildOutput,
) -> Result<BuildOutput> {
    let mut steps = previous.steps;

    for group in &groups_to_build {
        debug!(group = %group.label(), "building group");
        let step = builder.build(group).await.map_err(|e| match e {
            // Recoverable syntax errors keep their identity so dev mode can
            // re-arm on the broken file.
            e @ ExtkitError::SyntaxError { .. } => e,
            e @ ExtkitError::BuildError { .. } => e,
            other => ExtkitError::BuildError {
                group: group.label(),
                message: other.to_string(),
            },
        })?;
        steps.push(step);
    }

    // Retained + new steps, re-sorted into classification order so a partial
    // rebuild can never permute manifest field ordering.
    sort_steps(&mut steps, all_entrypoints);

    let public_assets = copy_public_dir(&ctx.public_dir(), &ctx.out_dir())?;

    let manifest = assemble_manifest(ctx, &steps, &public_assets)?;
    persist_manifest(ctx, &manifest)?;

    Ok(BuildOutput {
        manifest,
        public_assets,
        steps,
    })
}

fn sort_steps(steps: &mut [BuildStepOutput], all_entrypoints: &[Entrypoint]) {
    let index_of = |step: &BuildStepOutput| -> usize {
        step.entrypoints
            .members()
            .first()
            .and_then(|first| {
                all_entrypoints
                    .iter()
                    .position(|ep| ep.name == first.name)
            })
            .unwrap_or(usize::MAX)
    };
    steps.sort_by_key(index_of);
}

fn wipe_out_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        std::fs::remove_dir_all(out_dir)?;
    }
    std::fs::create_dir_all(out_dir)?;
    Ok(())
}

/// Copy the public/static directory verbatim into the bundle, returning one
/// [`OutputFile::Asset`] per copied file (bundle-relative names).
fn copy_public_dir(public_dir: &Path, out_dir: &Path) -> Result<Vec<OutputFile>> {
    let mut assets = Vec::new();

    if !public_dir.is_dir() {
        return Ok(assets);
    }

    let mut stack = vec![public_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                let rel = path
                    .strip_prefix(public_dir)
                    .expect("public files live under the public dir");
                let dest = out_dir.join(rel);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&path, &dest)?;
                assets.push(OutputFile::Asset {
                    file_name: rel_to_string(rel),
                });
            }
        }
    }

    // Deterministic regardless of directory iteration order.
    assets.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    Ok(assets)
}

fn rel_to_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `manifest.json` into the bundle: pretty-printed outside production,
/// minified in production.
fn persist_manifest(ctx: &OrchestratorContext, manifest: &serde_json::Value) -> Result<()> {
    let json = if ctx.mode.is_production() {
        serde_json::to_string(manifest)?
    } else {
        serde_json::to_string_pretty(manifest)?
    };

    let path = ctx.out_dir().join("manifest.json");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, json)?;
    debug!(path = ?path, "wrote manifest");
    Ok(())
}
