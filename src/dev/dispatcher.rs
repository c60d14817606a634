// src/dev/dispatcher.rs

//! The reload dispatcher.
//!
//! Invoked once per raw watcher event, possibly many per second, including
//! irrelevant paths (browser-profile churn, editor temp files). Every event
//! is pushed onto an in-memory FIFO queue immediately and unconditionally —
//! no event is ever dropped, even mid-rebuild. A single worker loop drains
//! the queue, waits a debounce window to coalesce bursts, and processes the
//! batch; it exits once a full drain+debounce cycle sees an empty queue.
//! Only one worker runs at a time: a second trigger while one is active
//! simply awaits the existing loop instead of starting another, giving
//! at-most-one-concurrent-rebuild with zero lost events.
//!
//! Build errors are caught here and logged; `current_output` is left
//! untouched until the next successful rebuild, so readers never observe a
//! broken bundle.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::build::backend::BuilderBackend;
use crate::build::orchestrator::rebuild;
use crate::build::output::BuildOutput;
use crate::config::{ManifestVersion, OrchestratorContext};
use crate::dev::change::{detect_dev_changes, DevModeChange};
use crate::dev::protocol::{ContentScriptPayload, ReloadMessage};
use crate::entrypoint::{Entrypoint, EntrypointGroup};
use crate::manifest::content_scripts::{find_css_asset, resolve_options};
use crate::runner::Runner;

/// Commands the dispatcher cannot execute itself and hands to the outer dev
/// session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Stop everything and start a fresh server (new Builder + Runner).
    FullRestart,
}

/// A recoverable build failure waiting for its broken file to change.
#[derive(Debug)]
struct RetryState {
    broken_file: PathBuf,
    /// The batch that failed, replayed once the broken file changes.
    pending_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum ReloadKind {
    Extension,
    Html,
    ContentScript,
}

pub struct ReloadDispatcher {
    ctx: Mutex<OrchestratorContext>,
    builder: Arc<dyn BuilderBackend>,
    runner: Arc<dyn Runner>,
    entrypoints: Mutex<Vec<Entrypoint>>,
    queue: Mutex<VecDeque<PathBuf>>,
    /// Held by the single active worker loop.
    worker: tokio::sync::Mutex<()>,
    /// Written only by the worker loop, as one whole-reference swap.
    current: RwLock<Option<Arc<BuildOutput>>>,
    retry: Mutex<Option<RetryState>>,
    outbound_tx: mpsc::UnboundedSender<ReloadMessage>,
    session_tx: mpsc::UnboundedSender<SessionCommand>,
}

/// Mutex poisoning only happens if a worker panicked mid-update; the data is
/// still the best snapshot we have, so keep going with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReloadDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: OrchestratorContext,
        builder: Arc<dyn BuilderBackend>,
        runner: Arc<dyn Runner>,
        entrypoints: Vec<Entrypoint>,
        initial_output: BuildOutput,
        outbound_tx: mpsc::UnboundedSender<ReloadMessage>,
        session_tx: mpsc::UnboundedSender<SessionCommand>,
    ) -> Self {
        Self {
            ctx: Mutex::new(ctx),
            builder,
            runner,
            entrypoints: Mutex::new(entrypoints),
            queue: Mutex::new(VecDeque::new()),
            worker: tokio::sync::Mutex::new(()),
            current: RwLock::new(Some(Arc::new(initial_output))),
            retry: Mutex::new(None),
            outbound_tx,
            session_tx,
        }
    }

    /// Snapshot of the current build output.
    pub fn current_output(&self) -> Option<Arc<BuildOutput>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Push raw watcher paths onto the queue. Never blocks, never drops.
    pub fn enqueue(&self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut queue = lock(&self.queue);
        queue.extend(paths);
    }

    /// The worker loop. Callers typically `enqueue` first and then spawn or
    /// await this; if a loop is already running, this call waits for it and
    /// then drains whatever it left behind (usually nothing).
    pub async fn run(&self) {
        let _guard = self.worker.lock().await;

        loop {
            if lock(&self.queue).is_empty() {
                break;
            }

            // Coalesce the burst: everything arriving within the debounce
            // window becomes one batch.
            let debounce = lock(&self.ctx).debounce();
            tokio::time::sleep(debounce).await;

            let batch: Vec<PathBuf> = lock(&self.queue).drain(..).collect();
            if batch.is_empty() {
                break;
            }

            self.process_batch(batch).await;
        }
    }

    async fn process_batch(&self, mut batch: Vec<PathBuf>) {
        batch.sort();
        batch.dedup();
        debug!(paths = batch.len(), "processing change batch");

        // Fresh immutable config snapshot for this iteration. A rebuild in
        // flight keeps the snapshot it started with.
        let ctx = {
            let previous = lock(&self.ctx).clone();
            match previous.reload() {
                Ok(fresh) => {
                    *lock(&self.ctx) = fresh.clone();
                    fresh
                }
                Err(e) => {
                    warn!(error = %e, "config reload failed; keeping previous snapshot");
                    previous
                }
            }
        };

        // Config-level changes alter build inputs outside the dependency
        // graph; they bypass change detection entirely.
        if batch.iter().any(|p| ctx.is_config_file(p)) {
            info!("config file changed; restarting dev server");
            let _ = self.session_tx.send(SessionCommand::FullRestart);
            return;
        }
        if let Some(runner_cfg) = ctx.runner_config_file() {
            if batch.iter().any(|p| *p == runner_cfg) {
                info!("runner config changed; restarting browser");
                self.restart_browser().await;
                return;
            }
        }

        // A previous recoverable build error waits for its broken file; its
        // batch is merged back in once that file changes.
        let replay = {
            let mut retry = lock(&self.retry);
            match retry.take() {
                Some(state) if batch.iter().any(|p| *p == state.broken_file) => {
                    info!(
                        path = ?state.broken_file,
                        "broken file changed; retrying the failed rebuild"
                    );
                    state.pending_paths
                }
                other => {
                    *retry = other;
                    Vec::new()
                }
            }
        };
        if !replay.is_empty() {
            batch.extend(replay);
            batch.sort();
            batch.dedup();
        }

        let previous = self.current_output();
        let change = detect_dev_changes(&batch, previous.as_deref());
        debug!(kind = change.kind_str(), "detected dev change");

        match change {
            DevModeChange::NoChange => {}
            DevModeChange::FullRestart => {
                let _ = self.session_tx.send(SessionCommand::FullRestart);
            }
            DevModeChange::BrowserRestart => {
                self.restart_browser().await;
            }
            DevModeChange::ExtensionReload {
                rebuild_groups,
                cached_output,
            } => {
                self.rebuild_and_notify(&ctx, ReloadKind::Extension, rebuild_groups, cached_output, batch)
                    .await;
            }
            DevModeChange::HtmlReload {
                rebuild_groups,
                cached_output,
            } => {
                self.rebuild_and_notify(&ctx, ReloadKind::Html, rebuild_groups, cached_output, batch)
                    .await;
            }
            DevModeChange::ContentScriptReload {
                rebuild_groups,
                cached_output,
            } => {
                self.rebuild_and_notify(
                    &ctx,
                    ReloadKind::ContentScript,
                    rebuild_groups,
                    cached_output,
                    batch,
                )
                .await;
            }
        }
    }

    async fn rebuild_and_notify(
        &self,
        ctx: &OrchestratorContext,
        kind: ReloadKind,
        groups: Vec<EntrypointGroup>,
        cached: BuildOutput,
        batch: Vec<PathBuf>,
    ) {
        let entrypoints = lock(&self.entrypoints).clone();
        let result = rebuild(ctx, self.builder.as_ref(), &entrypoints, groups.clone(), cached).await;

        match result {
            Ok(output) => {
                let output = Arc::new(output);
                {
                    let mut current = self
                        .current
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    *current = Some(Arc::clone(&output));
                }
                info!(steps = output.steps.len(), "rebuild succeeded");
                self.send_reload(kind, &groups, &output);
            }
            Err(e) if e.is_recoverable() => {
                let broken_file = e
                    .failing_path()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                info!(
                    path = ?broken_file,
                    "build paused on a syntax error; will retry when the file changes: {e}"
                );
                *lock(&self.retry) = Some(RetryState {
                    broken_file,
                    pending_paths: batch,
                });
            }
            Err(e) => {
                error!(error = %e, "rebuild failed; keeping previous output");
            }
        }
    }

    fn send_reload(&self, kind: ReloadKind, groups: &[EntrypointGroup], output: &BuildOutput) {
        match kind {
            ReloadKind::Extension => {
                self.send(ReloadMessage::ReloadExtension);
            }
            ReloadKind::Html => {
                for ep in groups.iter().flat_map(|g| g.members()) {
                    if ep.is_html() {
                        self.send(ReloadMessage::ReloadPage {
                            path: ep.entry_file_name(),
                        });
                    }
                }
            }
            ReloadKind::ContentScript => {
                for ep in groups.iter().flat_map(|g| g.members()) {
                    if let Some(msg) = content_script_message(ep, output) {
                        self.send(msg);
                    }
                }
            }
        }
    }

    fn send(&self, msg: ReloadMessage) {
        debug!(?msg, "sending reload message");
        if self.outbound_tx.send(msg).is_err() {
            warn!("reload channel closed; message dropped");
        }
    }

    async fn restart_browser(&self) {
        if let Err(e) = self.runner.close_browser().await {
            warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = self.runner.open_browser().await {
            warn!(error = %e, "failed to reopen browser");
        }
    }

    /// Inbound `wxt:background-initialized`: register all content scripts at
    /// runtime. Only meaningful in MV3 dev mode, where content scripts are
    /// absent from the manifest.
    pub async fn handle_background_initialized(&self) {
        let ctx = lock(&self.ctx).clone();
        if ctx.manifest_version != ManifestVersion::V3 {
            return;
        }
        let Some(output) = self.current_output() else {
            return;
        };

        let entrypoints = lock(&self.entrypoints).clone();
        for ep in entrypoints
            .iter()
            .filter(|e| e.is_content_script() && !e.skipped)
        {
            if let Some(msg) = content_script_message(ep, &output) {
                self.send(msg);
            }
        }
    }
}

/// Build the re-registration message for one content script.
fn content_script_message(ep: &Entrypoint, output: &BuildOutput) -> Option<ReloadMessage> {
    if !ep.is_content_script() {
        return None;
    }
    let opts = ep.options.as_content_script()?;
    let resolved = resolve_options(opts);

    let js = vec![ep.entry_file_name()];
    let css: Vec<String> = find_css_asset(&output.steps, &ep.name).into_iter().collect();

    Some(ReloadMessage::ReloadContentScript {
        registration: opts.registration.unwrap_or_default(),
        content_script: ContentScriptPayload::from_resolved(&resolved, js, css),
    })
}
