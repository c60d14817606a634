// src/dev/watcher.rs

//! Filesystem watcher feeding the reload dispatcher.
//!
//! Bridges `notify`'s synchronous callback into the async world through an
//! unbounded channel. Every event's paths are enqueued on the dispatcher
//! immediately; a worker run is then spawned, which either becomes the
//! active worker loop or waits for the existing one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::dev::dispatcher::ReloadDispatcher;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher over `roots` that feeds the dispatcher.
///
/// Missing roots are skipped with a warning (e.g. a project without a
/// public directory); files are watched non-recursively, directories
/// recursively. Event paths under any of the `ignore` prefixes are
/// discarded before they reach the queue — most importantly the output
/// directory, whose writes would otherwise feed back into the watcher.
pub fn spawn_watcher(
    roots: Vec<PathBuf>,
    ignore: Vec<PathBuf>,
    dispatcher: Arc<ReloadDispatcher>,
) -> Result<WatcherHandle> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(err) = event_tx.send(event) {
                        // We can't log via tracing here easily, so fallback to stderr.
                        eprintln!("extkit: failed to forward notify event: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("extkit: file watch error: {err}");
                }
            }
        },
        Config::default(),
    )?;

    for root in &roots {
        if !root.exists() {
            warn!(path = ?root, "watch root does not exist; skipping");
            continue;
        }
        let mode = if root.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode)?;
    }

    info!(?roots, "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            let paths: Vec<PathBuf> = event
                .paths
                .into_iter()
                .filter(|p| !ignore.iter().any(|prefix| p.starts_with(prefix)))
                .collect();
            if paths.is_empty() {
                continue;
            }

            // Enqueue before triggering so nothing is lost even when a
            // worker loop is mid-rebuild.
            dispatcher.enqueue(paths);

            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher.run().await;
            });
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
