// tests/classify_entrypoints.rs

mod common;
use crate::common::{builders, init_tracing, write_file};

use extkit::config::ContextOverrides;
use extkit::entrypoint::{classify_entrypoints, EntrypointType, RunAt};
use extkit_test_utils::fake_backend::FakeConfigReader;

#[tokio::test]
async fn classifies_a_typical_project() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "export default {};");
    write_file(dir.path(), "entrypoints/popup/index.html", "<title>Pop</title>");
    write_file(dir.path(), "entrypoints/overlay.content.ts", "export default {};");
    write_file(dir.path(), "entrypoints/welcome.html", "<html></html>");
    write_file(dir.path(), "entrypoints/injected.ts", "console.log(1)");
    write_file(dir.path(), "entrypoints/theme.css", "body {}");

    let ctx = builders::test_context(dir.path(), false);
    let reader = FakeConfigReader::new();
    reader.set(
        dir.path().join("entrypoints/overlay.content.ts"),
        serde_json::json!({ "matches": ["*://*/*"], "run_at": "document_start" }),
    );

    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();

    let find = |name: &str| eps.iter().find(|e| e.name == name).unwrap();
    assert_eq!(find("background").ty, EntrypointType::Background);
    assert_eq!(find("popup").ty, EntrypointType::Popup);
    assert_eq!(find("overlay").ty, EntrypointType::ContentScript);
    assert_eq!(find("welcome").ty, EntrypointType::UnlistedPage);
    assert_eq!(find("injected").ty, EntrypointType::UnlistedScript);
    assert_eq!(find("theme").ty, EntrypointType::UnlistedStyle);

    let overlay = find("overlay").options.as_content_script().unwrap();
    assert_eq!(overlay.run_at, Some(RunAt::DocumentStart));

    // Popup options come from the HTML itself.
    let popup = find("popup").options.as_page().unwrap();
    assert_eq!(popup.title.as_deref(), Some("Pop"));
}

#[tokio::test]
async fn classification_is_deterministic_across_runs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/zeta.content.ts", "");
    write_file(dir.path(), "entrypoints/alpha.content.ts", "");
    write_file(dir.path(), "entrypoints/background.ts", "");
    write_file(dir.path(), "entrypoints/popup.html", "<title>x</title>");

    let ctx = builders::test_context(dir.path(), false);
    let reader = FakeConfigReader::new();

    let first = classify_entrypoints(&ctx, &reader).await.unwrap();
    let second = classify_entrypoints(&ctx, &reader).await.unwrap();
    assert_eq!(first, second);

    // Lexicographic order regardless of creation order.
    let names: Vec<&str> = first.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "background", "popup", "zeta"]);
}

#[tokio::test]
async fn duplicate_names_report_every_conflicting_path() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/popup.html", "<title>a</title>");
    write_file(dir.path(), "entrypoints/popup/index.html", "<title>b</title>");

    let ctx = builders::test_context(dir.path(), false);
    let reader = FakeConfigReader::new();

    let err = classify_entrypoints(&ctx, &reader).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("popup.html"), "got: {msg}");
    assert!(msg.contains("popup/index.html"), "got: {msg}");
}

#[tokio::test]
async fn browser_exclude_list_drops_the_entrypoint() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "entrypoints/welcome.html",
        r#"<meta name="manifest.exclude" content='["chrome"]'><title>w</title>"#,
    );
    write_file(dir.path(), "entrypoints/popup.html", "<title>p</title>");

    // Default target browser is chrome.
    let ctx = builders::test_context(dir.path(), false);
    let reader = FakeConfigReader::new();

    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();
    assert!(eps.iter().all(|e| e.name != "welcome"));
    assert!(eps.iter().any(|e| e.name == "popup"));
}

#[tokio::test]
async fn filter_marks_non_matching_entrypoints_skipped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");
    write_file(dir.path(), "entrypoints/popup.html", "<title>p</title>");

    let ctx = builders::test_context_full(
        dir.path(),
        ContextOverrides {
            filter_entrypoints: vec!["popup".to_string()],
            ..Default::default()
        },
        |_| {},
    );
    let reader = FakeConfigReader::new();

    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();
    let background = eps.iter().find(|e| e.name == "background").unwrap();
    let popup = eps.iter().find(|e| e.name == "popup").unwrap();
    assert!(background.skipped);
    assert!(!popup.skipped);
}

#[tokio::test]
async fn serve_mode_synthesizes_a_virtual_background() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/popup.html", "<title>p</title>");

    let ctx = builders::test_context(dir.path(), true);
    let reader = FakeConfigReader::new();

    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();
    let bg = eps.iter().find(|e| e.is_background()).unwrap();
    assert!(bg.synthetic);

    // A one-shot build gets no virtual background.
    let ctx = builders::test_context(dir.path(), false);
    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();
    assert!(eps.iter().all(|e| !e.is_background()));
}

#[tokio::test]
async fn user_background_suppresses_the_virtual_one() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "entrypoints/background.ts", "");

    let ctx = builders::test_context(dir.path(), true);
    let reader = FakeConfigReader::new();

    let eps = classify_entrypoints(&ctx, &reader).await.unwrap();
    let backgrounds: Vec<_> = eps.iter().filter(|e| e.is_background()).collect();
    assert_eq!(backgrounds.len(), 1);
    assert!(!backgrounds[0].synthetic);
}
