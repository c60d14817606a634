// src/build/backend.rs

//! Pluggable Builder backend abstraction.
//!
//! The orchestrator talks to a [`BuilderBackend`] instead of a concrete
//! bundler. This keeps the actual module resolution / transformation /
//! chunking outside this crate and makes it easy to swap in a fake builder
//! in tests.
//!
//! - [`CommandBuilder`] is the production implementation. It spawns the
//!   configured `[commands].builder` command once per entrypoint group,
//!   writes a JSON build request to its stdin and reads a JSON chunk listing
//!   from its stdout. The chunk listing carries the per-chunk dependency set
//!   (`moduleIds`) that dev-mode change detection runs on.
//! - Tests provide their own `BuilderBackend` that fabricates chunks without
//!   spawning processes.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::build::output::{BuildStepOutput, OutputFile};
use crate::config::OrchestratorContext;
use crate::entrypoint::EntrypointGroup;
use crate::errors::{ExtkitError, Result};

/// Trait abstracting how an entrypoint group is compiled.
pub trait BuilderBackend: Send + Sync {
    /// Compile one group into a build step.
    ///
    /// The returned step's `entrypoints` must exactly equal `group`.
    fn build(
        &self,
        group: &EntrypointGroup,
    ) -> Pin<Box<dyn Future<Output = Result<BuildStepOutput>> + Send + '_>>;
}

/// JSON request written to the builder command's stdin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildRequest {
    browser: String,
    manifest_version: u64,
    mode: String,
    out_dir: String,
    analyze: bool,
    entrypoints: Vec<RequestEntrypoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestEntrypoint {
    name: String,
    #[serde(rename = "type")]
    ty: crate::entrypoint::EntrypointType,
    input_path: String,
    entry_file_name: String,
    synthetic: bool,
}

/// JSON response read from the builder command's stdout.
#[derive(Debug, Deserialize)]
struct BuildResponse {
    #[serde(default)]
    chunks: Vec<OutputFile>,
    #[serde(default)]
    error: Option<BuildResponseError>,
}

#[derive(Debug, Deserialize)]
struct BuildResponseError {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    path: Option<String>,
    message: String,
}

/// Production builder backend that shells out to the configured command.
pub struct CommandBuilder {
    command: String,
    browser: String,
    manifest_version: u64,
    mode: String,
    out_dir: String,
    analyze: bool,
}

impl CommandBuilder {
    /// Create a builder for one context snapshot.
    ///
    /// Fails when `[commands].builder` is not configured.
    pub fn from_context(ctx: &OrchestratorContext) -> Result<Self> {
        let command = ctx.config.commands.builder.clone().ok_or_else(|| {
            ExtkitError::ConfigError(
                "[commands].builder is not configured; extkit cannot compile without one"
                    .to_string(),
            )
        })?;

        Ok(Self {
            command,
            browser: ctx.browser.as_str().to_string(),
            manifest_version: ctx.manifest_version.as_u64(),
            mode: if ctx.mode.is_production() {
                "production".to_string()
            } else {
                "development".to_string()
            },
            out_dir: ctx.out_dir().display().to_string(),
            analyze: ctx.analyze(),
        })
    }

    fn request_for(&self, group: &EntrypointGroup) -> BuildRequest {
        BuildRequest {
            browser: self.browser.clone(),
            manifest_version: self.manifest_version,
            mode: self.mode.clone(),
            out_dir: self.out_dir.clone(),
            analyze: self.analyze,
            entrypoints: group
                .members()
                .iter()
                .map(|ep| RequestEntrypoint {
                    name: ep.name.clone(),
                    ty: ep.ty,
                    input_path: ep.input_path.display().to_string(),
                    entry_file_name: ep.entry_file_name(),
                    synthetic: ep.synthetic,
                })
                .collect(),
        }
    }
}

impl BuilderBackend for CommandBuilder {
    fn build(
        &self,
        group: &EntrypointGroup,
    ) -> Pin<Box<dyn Future<Output = Result<BuildStepOutput>> + Send + '_>> {
        let command = self.command.clone();
        let request = self.request_for(group);
        let group = group.clone();

        Box::pin(async move { run_builder_command(&command, request, group).await })
    }
}

async fn run_builder_command(
    command: &str,
    request: BuildRequest,
    group: EntrypointGroup,
) -> Result<BuildStepOutput> {
    debug!(group = %group.label(), cmd = %command, "invoking builder");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let request_json = serde_json::to_vec(&request)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&request_json).await?;
        // Close stdin so the builder sees EOF.
        drop(stdin);
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    // The builder reports structured errors on stdout when it can; fall back
    // to stderr for crashes.
    if let Ok(response) = serde_json::from_str::<BuildResponse>(stdout.trim()) {
        if let Some(err) = response.error {
            return Err(builder_error(&group, err));
        }
        if output.status.success() {
            return Ok(BuildStepOutput {
                entrypoints: group,
                chunks: response.chunks,
            });
        }
    }

    if output.status.success() {
        return Err(ExtkitError::BuildError {
            group: group.label(),
            message: format!("builder printed unparseable output: {}", stdout.trim()),
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(ExtkitError::BuildError {
        group: group.label(),
        message: stderr.trim().to_string(),
    })
}

fn builder_error(group: &EntrypointGroup, err: BuildResponseError) -> ExtkitError {
    match (err.kind.as_deref(), err.path) {
        // A syntax error in a named source file is recoverable in dev mode.
        (Some("syntax"), Some(path)) => ExtkitError::SyntaxError {
            path: path.into(),
            message: err.message,
        },
        _ => ExtkitError::BuildError {
            group: group.label(),
            message: err.message,
        },
    }
}
