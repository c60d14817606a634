// tests/manifest_assembly.rs

mod common;
use crate::common::builders::{
    asset, chunk, shared_step, single_step, test_context_full, EntrypointBuilder,
};

use std::path::Path;

use extkit::config::{ContextOverrides, ManifestVersion, TargetBrowser};
use extkit::entrypoint::{ContentScriptOptions, EntrypointType, RunAt};
use extkit::manifest::assemble_manifest;

fn chrome_mv3(root: &Path) -> extkit::config::OrchestratorContext {
    test_context_full(root, ContextOverrides::default(), |_| {})
}

fn firefox_mv2(root: &Path) -> extkit::config::OrchestratorContext {
    test_context_full(
        root,
        ContextOverrides {
            browser: Some(TargetBrowser::Firefox),
            manifest_version: Some(ManifestVersion::V2),
            ..Default::default()
        },
        |_| {},
    )
}

#[test]
fn seed_fields_and_background_mv3() {
    let root = Path::new("/project");
    let ctx = chrome_mv3(root);

    let bg = EntrypointBuilder::new("background", EntrypointType::Background).build();
    let input = bg.input_path.clone();
    let steps = vec![single_step(bg, vec![chunk("background.js", &[&input])])];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert_eq!(manifest["manifest_version"], 3);
    assert_eq!(manifest["name"], "Test Extension");
    assert_eq!(manifest["version"], "1.0.0");
    assert_eq!(manifest["background"]["service_worker"], "background.js");
}

#[test]
fn background_mv2_uses_scripts_and_persistent() {
    let root = Path::new("/project");
    let ctx = firefox_mv2(root);

    let bg = EntrypointBuilder::new("background", EntrypointType::Background).build();
    let input = bg.input_path.clone();
    let steps = vec![single_step(bg, vec![chunk("background.js", &[&input])])];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert_eq!(manifest["background"]["scripts"][0], "background.js");
    assert_eq!(manifest["background"]["persistent"], true);
    assert!(manifest["background"].get("service_worker").is_none());
}

#[test]
fn version_simplification_keeps_version_name_off_firefox() {
    let root = Path::new("/project");
    let with_prerelease = |raw: &mut extkit::config::RawProjectConfig| {
        raw.project.version = Some("1.0.0-alpha1".to_string());
    };

    let popup = EntrypointBuilder::new("popup", EntrypointType::Popup).build();
    let input = popup.input_path.clone();
    let steps = vec![shared_step(
        vec![popup],
        vec![chunk("popup.html", &[&input])],
    )];

    let ctx = test_context_full(root, ContextOverrides::default(), with_prerelease);
    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert_eq!(manifest["version"], "1.0.0");
    assert_eq!(manifest["version_name"], "1.0.0-alpha1");

    let ctx = test_context_full(
        root,
        ContextOverrides {
            browser: Some(TargetBrowser::Firefox),
            ..Default::default()
        },
        with_prerelease,
    );
    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert_eq!(manifest["version"], "1.0.0");
    assert!(manifest.get("version_name").is_none());
}

#[test]
fn four_part_versions_need_no_version_name() {
    let root = Path::new("/project");
    let ctx = test_context_full(root, ContextOverrides::default(), |raw| {
        raw.project.version = Some("1.0.0.1".to_string());
    });

    let popup = EntrypointBuilder::new("popup", EntrypointType::Popup).build();
    let input = popup.input_path.clone();
    let steps = vec![shared_step(vec![popup], vec![chunk("popup.html", &[&input])])];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert_eq!(manifest["version"], "1.0.0.1");
    assert!(manifest.get("version_name").is_none());
}

#[test]
fn invalid_version_is_fatal() {
    let root = Path::new("/project");
    let ctx = test_context_full(root, ContextOverrides::default(), |raw| {
        raw.project.version = Some("not-a-version".to_string());
    });

    let err = assemble_manifest(&ctx, &[], &[]).unwrap_err();
    assert!(err.to_string().contains("version"), "got: {err}");
}

#[test]
fn missing_name_is_fatal() {
    let root = Path::new("/project");
    let ctx = test_context_full(root, ContextOverrides::default(), |raw| {
        raw.project.name = None;
    });

    let err = assemble_manifest(&ctx, &[], &[]).unwrap_err();
    assert!(err.to_string().contains("name"), "got: {err}");
}

#[test]
fn user_manifest_fragment_wins_over_seed() {
    let root = Path::new("/project");
    let ctx = test_context_full(root, ContextOverrides::default(), |raw| {
        raw.manifest.insert(
            "name".to_string(),
            toml::Value::String("Custom Name".to_string()),
        );
        raw.manifest.insert(
            "homepage_url".to_string(),
            toml::Value::String("https://example.com".to_string()),
        );
    });

    let manifest = assemble_manifest(&ctx, &[], &[]).unwrap();
    assert_eq!(manifest["name"], "Custom Name");
    assert_eq!(manifest["homepage_url"], "https://example.com");
}

#[test]
fn popup_becomes_action_on_mv3_and_browser_action_on_mv2() {
    let root = Path::new("/project");
    let popup = EntrypointBuilder::new("popup", EntrypointType::Popup).build();
    let input = popup.input_path.clone();
    let steps = vec![shared_step(vec![popup], vec![chunk("popup.html", &[&input])])];

    let manifest = assemble_manifest(&chrome_mv3(root), &steps, &[]).unwrap();
    assert_eq!(manifest["action"]["default_popup"], "popup.html");

    let manifest = assemble_manifest(&firefox_mv2(root), &steps, &[]).unwrap();
    assert_eq!(manifest["browser_action"]["default_popup"], "popup.html");
    assert!(manifest.get("action").is_none());
}

#[test]
fn url_overrides_are_omitted_on_firefox() {
    let root = Path::new("/project");
    let newtab = EntrypointBuilder::new("newtab", EntrypointType::Newtab).build();
    let input = newtab.input_path.clone();
    let steps = vec![shared_step(vec![newtab], vec![chunk("newtab.html", &[&input])])];

    let manifest = assemble_manifest(&chrome_mv3(root), &steps, &[]).unwrap();
    assert_eq!(manifest["chrome_url_overrides"]["newtab"], "newtab.html");

    let manifest = assemble_manifest(&firefox_mv2(root), &steps, &[]).unwrap();
    assert!(manifest.get("chrome_url_overrides").is_none());
}

#[test]
fn sidepanel_maps_per_target() {
    let root = Path::new("/project");
    let panel = EntrypointBuilder::new("sidepanel", EntrypointType::Sidepanel).build();
    let input = panel.input_path.clone();
    let steps = vec![shared_step(vec![panel], vec![chunk("sidepanel.html", &[&input])])];

    let manifest = assemble_manifest(&chrome_mv3(root), &steps, &[]).unwrap();
    assert_eq!(manifest["side_panel"]["default_path"], "sidepanel.html");

    let firefox = test_context_full(
        root,
        ContextOverrides {
            browser: Some(TargetBrowser::Firefox),
            ..Default::default()
        },
        |_| {},
    );
    let manifest = assemble_manifest(&firefox, &steps, &[]).unwrap();
    assert_eq!(manifest["sidebar_action"]["default_panel"], "sidepanel.html");

    // MV2 chromium has no side panel API at all.
    let chrome_mv2 = test_context_full(
        root,
        ContextOverrides {
            manifest_version: Some(ManifestVersion::V2),
            ..Default::default()
        },
        |_| {},
    );
    let manifest = assemble_manifest(&chrome_mv2, &steps, &[]).unwrap();
    assert!(manifest.get("side_panel").is_none());
    assert!(manifest.get("sidebar_action").is_none());
}

#[test]
fn content_scripts_land_in_the_manifest_for_production() {
    let root = Path::new("/project");
    let ctx = chrome_mv3(root);

    let overlay = EntrypointBuilder::new("overlay", EntrypointType::ContentScript)
        .matches(&["*://example.com/*"])
        .build();
    let input = overlay.input_path.clone();
    let steps = vec![single_step(
        overlay,
        vec![chunk("content-scripts/overlay.js", &[&input])],
    )];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    let entry = &manifest["content_scripts"][0];
    assert_eq!(entry["matches"][0], "*://example.com/*");
    assert_eq!(entry["js"][0], "content-scripts/overlay.js");
}

#[test]
fn dev_mode_mv3_moves_content_script_matches_to_host_permissions() {
    let root = Path::new("/project");
    let ctx = test_context_full(
        root,
        ContextOverrides {
            serve: true,
            ..Default::default()
        },
        |_| {},
    );

    let overlay = EntrypointBuilder::new("overlay", EntrypointType::ContentScript)
        .matches(&["*://example.com/*"])
        .build();
    let input = overlay.input_path.clone();
    let steps = vec![single_step(
        overlay,
        vec![chunk("content-scripts/overlay.js", &[&input])],
    )];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    assert!(manifest.get("content_scripts").is_none());

    let hosts: Vec<&str> = manifest["host_permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(hosts.contains(&"*://example.com/*"), "got: {hosts:?}");

    // Dev additions: forced permissions and widened CSP.
    let perms: Vec<&str> = manifest["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(perms.contains(&"tabs"));
    assert!(perms.contains(&"scripting"));
    assert!(
        manifest["content_security_policy"]["extension_pages"]
            .as_str()
            .unwrap()
            .contains("http://localhost:3000")
    );
}

#[test]
fn equivalent_content_scripts_merge_into_one_entry() {
    let root = Path::new("/project");
    let ctx = chrome_mv3(root);

    let opts_a = ContentScriptOptions {
        matches: vec!["*://google.com/*".into(), "*://duckduckgo.com/*".into()],
        all_frames: Some(true),
        ..Default::default()
    };
    // Same declaration, different field spelling and array order, plus an
    // explicit default.
    let opts_b = ContentScriptOptions {
        matches: vec!["*://duckduckgo.com/*".into(), "*://google.com/*".into()],
        all_frames: Some(true),
        run_at: Some(RunAt::DocumentIdle),
        ..Default::default()
    };

    let a = EntrypointBuilder::new("alpha", EntrypointType::ContentScript)
        .content_script_options(opts_a)
        .build();
    let b = EntrypointBuilder::new("beta", EntrypointType::ContentScript)
        .content_script_options(opts_b)
        .build();
    let a_input = a.input_path.clone();
    let b_input = b.input_path.clone();

    let steps = vec![
        single_step(a, vec![chunk("content-scripts/alpha.js", &[&a_input])]),
        single_step(b, vec![chunk("content-scripts/beta.js", &[&b_input])]),
    ];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    let entries = manifest["content_scripts"].as_array().unwrap();
    assert_eq!(entries.len(), 1);

    let js: Vec<&str> = entries[0]["js"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(js, vec!["content-scripts/alpha.js", "content-scripts/beta.js"]);
    // Matches are sorted canonically.
    assert_eq!(entries[0]["matches"][0], "*://duckduckgo.com/*");
    assert_eq!(entries[0]["all_frames"], true);
}

#[test]
fn content_script_css_is_resolved_from_step_assets() {
    let root = Path::new("/project");
    let ctx = chrome_mv3(root);

    let overlay = EntrypointBuilder::new("overlay", EntrypointType::ContentScript).build();
    let input = overlay.input_path.clone();
    let steps = vec![single_step(
        overlay,
        vec![
            chunk("content-scripts/overlay.js", &[&input]),
            asset("assets/overlay.css"),
        ],
    )];

    let manifest = assemble_manifest(&ctx, &steps, &[]).unwrap();
    let entry = &manifest["content_scripts"][0];
    assert_eq!(entry["css"][0], "assets/overlay.css");
}
