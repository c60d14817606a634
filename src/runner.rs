// src/runner.rs

//! Pluggable browser runner abstraction.
//!
//! The dev session talks to a [`Runner`] instead of a concrete browser
//! launcher. Production uses [`CommandRunner`], which spawns the configured
//! `[runner].command` (with `{out_dir}` substituted by the bundle
//! directory) and kills the child on close; tests can provide their own
//! implementation that records calls.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// Trait abstracting how a browser instance is opened and closed.
pub trait Runner: Send + Sync {
    fn open_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
    fn close_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real runner that launches the configured browser command.
pub struct CommandRunner {
    command: Option<String>,
    out_dir: PathBuf,
    child: tokio::sync::Mutex<Option<tokio::process::Child>>,
}

impl CommandRunner {
    pub fn new(command: Option<String>, out_dir: PathBuf) -> Self {
        Self {
            command,
            out_dir,
            child: tokio::sync::Mutex::new(None),
        }
    }
}

impl Runner for CommandRunner {
    fn open_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let Some(template) = &self.command else {
                warn!("[runner].command is not configured; open the browser manually");
                return Ok(());
            };
            let cmd_str = template.replace("{out_dir}", &self.out_dir.display().to_string());
            info!(cmd = %cmd_str, "opening browser");

            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&cmd_str);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&cmd_str);
                c
            };
            cmd.kill_on_drop(true);

            let child = cmd.spawn()?;

            let mut guard = self.child.lock().await;
            if let Some(mut previous) = guard.replace(child) {
                debug!("killing previous browser process");
                let _ = previous.kill().await;
            }
            Ok(())
        })
    }

    fn close_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.child.lock().await;
            if let Some(mut child) = guard.take() {
                info!("closing browser");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill browser process");
                }
            }
            Ok(())
        })
    }
}
