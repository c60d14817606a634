// src/manifest/assemble.rs

//! Manifest assembly.
//!
//! Field population order is fixed: seed fields, the user manifest fragment
//! (user wins on conflict), then the per-entrypoint sections derived from
//! the actual build output. Combined with deterministic step ordering this
//! makes `manifest.json` byte-identical across repeated builds of an
//! unchanged tree.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::build::output::{BuildStepOutput, OutputFile};
use crate::config::{ManifestVersion, OrchestratorContext};
use crate::entrypoint::{
    Entrypoint, EntrypointType, ModuleFormat, Mv2Key, RunAt, ScriptWorld,
};
use crate::errors::{ExtkitError, Result};
use crate::manifest::content_scripts::{group_content_scripts, ContentScriptEntry};
use crate::manifest::icons::discover_icons;
use crate::manifest::version::simplify_version;

/// Assemble the manifest for the given build.
///
/// `steps` must be in final (classification) order; manifest field content
/// follows it. Missing `name`/`version` after all merges is fatal.
pub fn assemble_manifest(
    ctx: &OrchestratorContext,
    steps: &[BuildStepOutput],
    public_assets: &[OutputFile],
) -> Result<Value> {
    let fragment = ctx.config.manifest_fragment();
    let mut fragment = fragment.as_object().cloned().unwrap_or_default();

    let mut manifest = seed_manifest(ctx, &fragment, public_assets)?;
    // The user's version was already folded into the seed (simplified);
    // merging the raw string back would undo that.
    fragment.remove("version");
    deep_merge(&mut manifest, fragment);

    let entrypoints: Vec<&Entrypoint> = steps
        .iter()
        .flat_map(|s| s.entrypoints.members())
        .collect();

    apply_background(ctx, &mut manifest, &entrypoints);
    apply_popup(ctx, &mut manifest, &entrypoints);
    apply_options(ctx, &mut manifest, &entrypoints);
    apply_devtools(&mut manifest, &entrypoints);
    apply_url_overrides(ctx, &mut manifest, &entrypoints);
    apply_sandbox(ctx, &mut manifest, &entrypoints);
    apply_sidepanel(ctx, &mut manifest, &entrypoints);
    apply_content_scripts(ctx, &mut manifest, &entrypoints, steps);

    if ctx.is_serve() {
        apply_dev_additions(ctx, &mut manifest);
    }

    check_required_fields(&manifest)?;

    Ok(Value::Object(manifest))
}

/// Seed fields: manifest_version, name, description, version, version_name
/// and discovered icons.
fn seed_manifest(
    ctx: &OrchestratorContext,
    fragment: &Map<String, Value>,
    public_assets: &[OutputFile],
) -> Result<Map<String, Value>> {
    let mut manifest = Map::new();
    manifest.insert(
        "manifest_version".to_string(),
        json!(ctx.manifest_version.as_u64()),
    );

    if let Some(name) = &ctx.config.project.name {
        manifest.insert("name".to_string(), json!(name));
    }
    if let Some(description) = &ctx.config.project.description {
        manifest.insert("description".to_string(), json!(description));
    }

    let user_set_version = fragment.contains_key("version");
    let raw_version = fragment
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| ctx.config.project.version.clone());

    if let Some(raw) = raw_version {
        let simplified = simplify_version(&raw)?;
        manifest.insert("version".to_string(), json!(simplified));

        // The full version string survives as version_name, but only on
        // targets that support it and only when derived from the project
        // version rather than a user-supplied manifest field.
        if simplified != raw && !ctx.browser.is_firefox() && !user_set_version {
            manifest.insert("version_name".to_string(), json!(raw));
        }
    }

    let icons = discover_icons(public_assets);
    if !icons.is_empty() {
        let mut obj = Map::new();
        for (size, path) in icons {
            obj.insert(size.to_string(), json!(path));
        }
        manifest.insert("icons".to_string(), Value::Object(obj));
    }

    Ok(manifest)
}

/// Recursive merge with `other` winning on conflicts. Objects merge key by
/// key; everything else (arrays included) is replaced wholesale. Existing
/// keys keep their position so merge order stays deterministic.
fn deep_merge(base: &mut Map<String, Value>, other: Map<String, Value>) {
    for (key, value) in other {
        match base.entry(key) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            serde_json::map::Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Object(existing), Value::Object(incoming)) => {
                    deep_merge(existing, incoming);
                }
                (slot_value, value) => {
                    *slot_value = value;
                }
            },
        }
    }
}

fn apply_background(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let Some(bg) = entrypoints.iter().find(|e| e.is_background()) else {
        return;
    };
    let path = bg.entry_file_name();

    let mut obj = Map::new();
    match ctx.manifest_version {
        ManifestVersion::V3 => {
            obj.insert("service_worker".to_string(), json!(path));
            if bg.module_format() == ModuleFormat::Esm {
                obj.insert("type".to_string(), json!("module"));
            }
        }
        ManifestVersion::V2 => {
            obj.insert("scripts".to_string(), json!([path]));
            let persistent = bg
                .options
                .as_background()
                .and_then(|o| o.persistent)
                .unwrap_or(true);
            obj.insert("persistent".to_string(), json!(persistent));
        }
    }
    manifest.insert("background".to_string(), Value::Object(obj));
}

fn apply_popup(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let Some(popup) = entrypoints.iter().find(|e| e.ty == EntrypointType::Popup) else {
        return;
    };
    let opts = popup.options.as_page();

    let mut action = Map::new();
    if let Some(title) = opts.and_then(|o| o.title.as_ref()) {
        action.insert("default_title".to_string(), json!(title));
    }
    action.insert("default_popup".to_string(), json!(popup.entry_file_name()));

    let key = match ctx.manifest_version {
        ManifestVersion::V3 => "action",
        ManifestVersion::V2 => match opts.and_then(|o| o.mv2_key) {
            Some(Mv2Key::PageAction) => "page_action",
            _ => "browser_action",
        },
    };
    manifest.insert(key.to_string(), Value::Object(action));
}

fn apply_options(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let Some(options) = entrypoints.iter().find(|e| e.ty == EntrypointType::Options) else {
        return;
    };
    let opts = options.options.as_page();

    let mut obj = Map::new();
    obj.insert("page".to_string(), json!(options.entry_file_name()));
    if let Some(open_in_tab) = opts.and_then(|o| o.open_in_tab) {
        obj.insert("open_in_tab".to_string(), json!(open_in_tab));
    }
    if opts.and_then(|o| o.browser_style) == Some(true) {
        // Same toggle, different key per vendor.
        let key = if ctx.browser.is_firefox() {
            "browser_style"
        } else {
            "chrome_style"
        };
        obj.insert(key.to_string(), json!(true));
    }
    manifest.insert("options_ui".to_string(), Value::Object(obj));
}

fn apply_devtools(manifest: &mut Map<String, Value>, entrypoints: &[&Entrypoint]) {
    if let Some(devtools) = entrypoints.iter().find(|e| e.ty == EntrypointType::Devtools) {
        manifest.insert(
            "devtools_page".to_string(),
            json!(devtools.entry_file_name()),
        );
    }
}

fn apply_url_overrides(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let overrides: &[(EntrypointType, &str)] = &[
        (EntrypointType::Newtab, "newtab"),
        (EntrypointType::History, "history"),
        (EntrypointType::Bookmarks, "bookmarks"),
    ];

    let mut obj = Map::new();
    for (ty, key) in overrides {
        let Some(ep) = entrypoints.iter().find(|e| e.ty == *ty) else {
            continue;
        };
        if ctx.browser.is_firefox() {
            warn!(
                entrypoint = %ep.name,
                "chrome_url_overrides.{key} is not supported on Firefox; omitting"
            );
            continue;
        }
        obj.insert(key.to_string(), json!(ep.entry_file_name()));
    }

    if !obj.is_empty() {
        manifest.insert("chrome_url_overrides".to_string(), Value::Object(obj));
    }
}

fn apply_sandbox(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let pages: Vec<String> = entrypoints
        .iter()
        .filter(|e| e.ty == EntrypointType::Sandbox)
        .map(|e| e.entry_file_name())
        .collect();

    if pages.is_empty() {
        return;
    }
    if ctx.browser.is_firefox() {
        warn!("sandbox pages are not supported on Firefox; omitting");
        return;
    }

    manifest.insert("sandbox".to_string(), json!({ "pages": pages }));
}

fn apply_sidepanel(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
) {
    let panels: Vec<&&Entrypoint> = entrypoints
        .iter()
        .filter(|e| e.ty == EntrypointType::Sidepanel)
        .collect();

    // Default panel: the one literally named "sidepanel", else the first.
    let Some(default) = panels
        .iter()
        .find(|e| e.name == "sidepanel")
        .or_else(|| panels.first())
    else {
        return;
    };
    let path = default.entry_file_name();

    if ctx.browser.is_firefox() {
        manifest.insert(
            "sidebar_action".to_string(),
            json!({ "default_panel": path }),
        );
    } else {
        match ctx.manifest_version {
            ManifestVersion::V3 => {
                manifest.insert("side_panel".to_string(), json!({ "default_path": path }));
            }
            ManifestVersion::V2 => {
                warn!(
                    entrypoint = %default.name,
                    "side panels require MV3 on chromium targets; omitting"
                );
            }
        }
    }
}

fn apply_content_scripts(
    ctx: &OrchestratorContext,
    manifest: &mut Map<String, Value>,
    entrypoints: &[&Entrypoint],
    steps: &[BuildStepOutput],
) {
    let content_scripts: Vec<&Entrypoint> = entrypoints
        .iter()
        .copied()
        .filter(|e| e.is_content_script())
        .collect();

    if content_scripts.is_empty() {
        return;
    }

    let entries = group_content_scripts(&content_scripts, steps);

    // MV3 dev mode registers content scripts at runtime through the
    // scripting API so they can hot-reload without reinstalling; the
    // manifest only needs the host permissions they will claim.
    if ctx.is_serve() && ctx.manifest_version == ManifestVersion::V3 {
        let mut hosts: Vec<String> = entries
            .iter()
            .flat_map(|e| e.declaration.matches.iter().cloned())
            .collect();
        hosts.sort();
        hosts.dedup();
        for host in hosts {
            push_unique(manifest, "host_permissions", json!(host));
        }
        return;
    }

    let json_entries: Vec<Value> = entries
        .iter()
        .map(|e| content_script_entry_to_json(e, ctx.manifest_version))
        .collect();
    manifest.insert("content_scripts".to_string(), Value::Array(json_entries));
}

fn content_script_entry_to_json(entry: &ContentScriptEntry, mv: ManifestVersion) -> Value {
    let d = &entry.declaration;
    let mut obj = Map::new();

    obj.insert("matches".to_string(), json!(d.matches));
    if !d.exclude_matches.is_empty() {
        obj.insert("exclude_matches".to_string(), json!(d.exclude_matches));
    }
    if !d.include_globs.is_empty() {
        obj.insert("include_globs".to_string(), json!(d.include_globs));
    }
    if !d.exclude_globs.is_empty() {
        obj.insert("exclude_globs".to_string(), json!(d.exclude_globs));
    }
    if d.match_about_blank {
        obj.insert("match_about_blank".to_string(), json!(true));
    }
    if d.match_origin_as_fallback && mv == ManifestVersion::V3 {
        obj.insert("match_origin_as_fallback".to_string(), json!(true));
    }
    if d.run_at != RunAt::DocumentIdle {
        obj.insert("run_at".to_string(), serde_json::to_value(d.run_at).unwrap_or(Value::Null));
    }
    if d.all_frames {
        obj.insert("all_frames".to_string(), json!(true));
    }
    if d.world == ScriptWorld::Main && mv == ManifestVersion::V3 {
        obj.insert("world".to_string(), json!("MAIN"));
    }

    obj.insert("js".to_string(), json!(entry.js));
    if !entry.css.is_empty() {
        obj.insert("css".to_string(), json!(entry.css));
    }

    Value::Object(obj)
}

/// Dev-mode-only manifest additions: widened CSP for the dev-server origin,
/// a host permission for it, and forced `tabs` (+ `scripting` on MV3).
fn apply_dev_additions(ctx: &OrchestratorContext, manifest: &mut Map<String, Value>) {
    let origin = ctx.dev_server_origin();

    push_unique(manifest, "permissions", json!("tabs"));
    match ctx.manifest_version {
        ManifestVersion::V3 => {
            push_unique(manifest, "permissions", json!("scripting"));
            push_unique(manifest, "host_permissions", json!(format!("{origin}/*")));
            manifest.insert(
                "content_security_policy".to_string(),
                json!({
                    "extension_pages": format!(
                        "script-src 'self' 'wasm-unsafe-eval' {origin}; object-src 'self';"
                    )
                }),
            );
        }
        ManifestVersion::V2 => {
            push_unique(manifest, "permissions", json!(format!("{origin}/*")));
            manifest.insert(
                "content_security_policy".to_string(),
                json!(format!("script-src 'self' {origin}; object-src 'self';")),
            );
        }
    }
}

/// Append to an array-valued field, creating it if absent, skipping
/// duplicates.
fn push_unique(manifest: &mut Map<String, Value>, key: &str, value: Value) {
    let arr = manifest
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = arr {
        if !items.contains(&value) {
            items.push(value);
        }
    }
}

fn check_required_fields(manifest: &Map<String, Value>) -> Result<()> {
    let mut missing = Vec::new();
    for field in ["name", "version"] {
        let present = manifest
            .get(field)
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !present {
            missing.push(field);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExtkitError::ConfigError(format!(
            "manifest is missing required fields: {} (set them in [project] or [manifest])",
            missing.join(", ")
        )))
    }
}
