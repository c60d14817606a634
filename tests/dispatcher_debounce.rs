// tests/dispatcher_debounce.rs

mod common;
use crate::common::{builders, init_tracing, write_file};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use extkit::build::BuildOutput;
use extkit::dev::dispatcher::{ReloadDispatcher, SessionCommand};
use extkit::dev::protocol::ReloadMessage;
use extkit::entrypoint::{Entrypoint, EntrypointType};
use extkit_test_utils::builders::{chunk, output, single_step, EntrypointBuilder};
use extkit_test_utils::fake_backend::{FakeBuilder, FakeFailure, FakeRunner};
use extkit_test_utils::with_timeout;

const DEBOUNCE_MS: u64 = 200;

struct Harness {
    dispatcher: Arc<ReloadDispatcher>,
    builder: Arc<FakeBuilder>,
    outbound_rx: mpsc::UnboundedReceiver<ReloadMessage>,
    session_rx: mpsc::UnboundedReceiver<SessionCommand>,
    background: Entrypoint,
}

/// Dispatcher wired to fakes, with one background entrypoint whose module
/// graph contains its own input path.
fn harness(root: &std::path::Path) -> Harness {
    let ctx = builders::test_context_with(root, true, |raw| {
        raw.dev.debounce_ms = DEBOUNCE_MS;
    });

    let background = EntrypointBuilder::new("background", EntrypointType::Background)
        .input_path(root.join("entrypoints/background.ts"))
        .build();
    let input = background.input_path.clone();

    let initial: BuildOutput = output(
        vec![single_step(
            background.clone(),
            vec![chunk("background.js", &[&input])],
        )],
        vec![],
    );

    let builder = FakeBuilder::new();
    let runner = FakeRunner::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (session_tx, session_rx) = mpsc::unbounded_channel();

    let dispatcher = Arc::new(ReloadDispatcher::new(
        ctx,
        builder.clone(),
        runner,
        vec![background.clone()],
        initial,
        outbound_tx,
        session_tx,
    ));

    Harness {
        dispatcher,
        builder,
        outbound_rx,
        session_rx,
        background,
    }
}

fn trigger(dispatcher: &Arc<ReloadDispatcher>, paths: Vec<PathBuf>) -> tokio::task::JoinHandle<()> {
    dispatcher.enqueue(paths);
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move { dispatcher.run().await })
}

#[tokio::test]
async fn events_within_the_debounce_window_coalesce_into_one_rebuild() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    let input = h.background.input_path.clone();

    // First event starts the worker; second arrives mid-debounce.
    let worker = trigger(&h.dispatcher, vec![input.clone()]);
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS / 2)).await;
    let second = trigger(&h.dispatcher, vec![input.clone()]);

    with_timeout(async {
        worker.await.unwrap();
        second.await.unwrap();
    })
    .await;

    assert_eq!(h.builder.build_count(), 1);
    let msg = h.outbound_rx.try_recv().unwrap();
    assert_eq!(msg, ReloadMessage::ReloadExtension);
    assert!(h.outbound_rx.try_recv().is_err(), "exactly one message");
}

#[tokio::test]
async fn an_irrelevant_event_does_not_suppress_a_later_relevant_one() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    let irrelevant = dir.path().join("browser-profile/Cache/junk");
    let relevant = h.background.input_path.clone();

    let worker = trigger(&h.dispatcher, vec![irrelevant]);
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS / 2)).await;
    let second = trigger(&h.dispatcher, vec![relevant]);

    with_timeout(async {
        worker.await.unwrap();
        second.await.unwrap();
    })
    .await;

    assert_eq!(h.builder.build_count(), 1);
    assert_eq!(h.outbound_rx.try_recv().unwrap(), ReloadMessage::ReloadExtension);
}

#[tokio::test]
async fn irrelevant_batches_cause_no_rebuild_and_no_messages() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    let worker = trigger(&h.dispatcher, vec![dir.path().join("unrelated.txt")]);
    with_timeout(async { worker.await.unwrap() }).await;

    assert_eq!(h.builder.build_count(), 0);
    assert!(h.outbound_rx.try_recv().is_err());
}

#[tokio::test]
async fn successful_rebuild_swaps_the_current_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let h = harness(dir.path());

    let before = h.dispatcher.current_output().unwrap();
    let worker = trigger(&h.dispatcher, vec![h.background.input_path.clone()]);
    with_timeout(async { worker.await.unwrap() }).await;

    let after = h.dispatcher.current_output().unwrap();
    assert!(!Arc::ptr_eq(&before, &after), "output must be swapped");
    assert_eq!(after.steps.len(), 1);
}

#[tokio::test]
async fn build_errors_keep_the_previous_output_and_send_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    h.builder
        .fail_once("background", FakeFailure::Build("bundler exploded".into()));

    let before = h.dispatcher.current_output().unwrap();
    let worker = trigger(&h.dispatcher, vec![h.background.input_path.clone()]);
    with_timeout(async { worker.await.unwrap() }).await;

    let after = h.dispatcher.current_output().unwrap();
    assert!(Arc::ptr_eq(&before, &after), "output must be untouched");
    assert!(h.outbound_rx.try_recv().is_err());
}

#[tokio::test]
async fn syntax_errors_pause_until_the_broken_file_changes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    let input = h.background.input_path.clone();
    h.builder
        .fail_once("background", FakeFailure::Syntax(input.clone()));

    // First attempt fails recoverably.
    let worker = trigger(&h.dispatcher, vec![input.clone()]);
    with_timeout(async { worker.await.unwrap() }).await;
    assert_eq!(h.builder.build_count(), 1);
    assert!(h.outbound_rx.try_recv().is_err());

    // The broken file changes again: the rebuild retries and succeeds.
    let worker = trigger(&h.dispatcher, vec![input]);
    with_timeout(async { worker.await.unwrap() }).await;
    assert_eq!(h.builder.build_count(), 2);
    assert_eq!(h.outbound_rx.try_recv().unwrap(), ReloadMessage::ReloadExtension);
}

#[tokio::test]
async fn config_file_changes_request_a_full_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let mut h = harness(dir.path());

    let config_path = dir.path().join("Extkit.toml");
    let worker = trigger(&h.dispatcher, vec![config_path]);
    with_timeout(async { worker.await.unwrap() }).await;

    assert_eq!(h.session_rx.try_recv().unwrap(), SessionCommand::FullRestart);
    assert_eq!(h.builder.build_count(), 0, "restart bypasses the rebuild");
}

#[tokio::test]
async fn events_arriving_mid_rebuild_trigger_a_second_batch() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    let h = harness(dir.path());

    let input = h.background.input_path.clone();

    let worker = trigger(&h.dispatcher, vec![input.clone()]);
    // Wait past the debounce so the first batch is being processed, then
    // push another event; the worker loop must pick it up before exiting.
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 50)).await;
    let second = trigger(&h.dispatcher, vec![input.clone()]);

    with_timeout(async {
        worker.await.unwrap();
        second.await.unwrap();
    })
    .await;

    assert_eq!(h.builder.build_count(), 2);
}
