// src/entrypoint/reader.rs

//! Pluggable Module Config Reader abstraction.
//!
//! Script entrypoints (background, content scripts) export a declarative
//! options object next to their `main` function. Evaluating that export is
//! inherently dynamic and lives outside this crate: the classifier talks to
//! a [`ModuleConfigReader`] instead of a concrete evaluator.
//!
//! - [`CommandConfigReader`] is the production implementation. It shells out
//!   to the configured `[commands].config_reader` command with the module
//!   path as argument and expects a JSON object on stdout; the command must
//!   evaluate the default export *without* running `main`.
//! - [`NullConfigReader`] returns an empty option map and is used when no
//!   command is configured (entrypoints then rely entirely on defaults).
//! - Tests provide their own in-memory implementation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{ExtkitError, Result};

/// Declarative options as read from a module's default export.
pub type OptionMap = serde_json::Map<String, serde_json::Value>;

/// Trait abstracting how script entrypoint options are evaluated.
pub trait ModuleConfigReader: Send + Sync {
    /// Read the declarative options object of the module at `path`.
    fn read(&self, path: &Path) -> Pin<Box<dyn Future<Output = Result<OptionMap>> + Send + '_>>;
}

/// Reader that always returns an empty option map.
#[derive(Debug, Clone, Default)]
pub struct NullConfigReader;

impl ModuleConfigReader for NullConfigReader {
    fn read(&self, _path: &Path) -> Pin<Box<dyn Future<Output = Result<OptionMap>> + Send + '_>> {
        Box::pin(async { Ok(OptionMap::new()) })
    }
}

/// Production reader that delegates to an external command.
pub struct CommandConfigReader {
    command: String,
}

impl CommandConfigReader {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ModuleConfigReader for CommandConfigReader {
    fn read(&self, path: &Path) -> Pin<Box<dyn Future<Output = Result<OptionMap>> + Send + '_>> {
        let command = self.command.clone();
        let path = path.to_path_buf();

        Box::pin(async move { read_via_command(&command, &path).await })
    }
}

async fn read_via_command(command: &str, path: &PathBuf) -> Result<OptionMap> {
    let full = format!("{} {}", command, shell_quote(path));
    debug!(cmd = %full, "evaluating module config");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&full);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&full);
        c
    };

    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        // A module that fails to evaluate is a source-level problem in that
        // file; dev mode treats it as recoverable and retries on next edit.
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtkitError::SyntaxError {
            path: path.clone(),
            message: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(stdout.trim()).map_err(|e| ExtkitError::SyntaxError {
            path: path.clone(),
            message: format!("config reader did not print a JSON object: {e}"),
        })?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(OptionMap::new()),
        other => Err(ExtkitError::SyntaxError {
            path: path.clone(),
            message: format!("config reader printed {other} instead of an object"),
        }),
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
