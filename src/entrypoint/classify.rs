// src/entrypoint/classify.rs

//! Entrypoint classification.
//!
//! Files under the entrypoints directory are listed recursively, sorted
//! lexicographically, and matched against an **ordered** glob → type rule
//! table, most-specific rules first; the first match wins. Classification is
//! therefore deterministic and independent of filesystem listing order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::config::{OrchestratorContext, TargetBrowser};
use crate::entrypoint::html_meta::parse_html_meta;
use crate::entrypoint::reader::{ModuleConfigReader, OptionMap};
use crate::entrypoint::{
    BackgroundOptions, ContentScriptOptions, Entrypoint, EntrypointOptions, EntrypointType,
    PageOptions,
};
use crate::errors::{ExtkitError, Result};

/// One ordered rule of the classification table.
struct Rule {
    globs: GlobSet,
    ty: EntrypointType,
}

/// The ordered rule table. Most-specific rules must come first: e.g.
/// `background.[jt]s` and `*.content.[jt]sx?` are listed before the
/// `*.[jt]sx?` unlisted-script catch-all, and `*.sandbox.html` before the
/// `*.html` unlisted-page catch-all.
fn rule_table() -> &'static [Rule] {
    static TABLE: OnceLock<Vec<Rule>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let rules: &[(&[&str], EntrypointType)] = &[
            (
                &["background.{js,ts}", "background/index.{js,ts}"],
                EntrypointType::Background,
            ),
            (
                &[
                    "content.{js,jsx,ts,tsx}",
                    "content/index.{js,jsx,ts,tsx}",
                    "*.content.{js,jsx,ts,tsx}",
                    "*.content/index.{js,jsx,ts,tsx}",
                ],
                EntrypointType::ContentScript,
            ),
            (
                &["popup.html", "popup/index.html"],
                EntrypointType::Popup,
            ),
            (
                &["options.html", "options/index.html"],
                EntrypointType::Options,
            ),
            (
                &["newtab.html", "newtab/index.html"],
                EntrypointType::Newtab,
            ),
            (
                &["history.html", "history/index.html"],
                EntrypointType::History,
            ),
            (
                &["bookmarks.html", "bookmarks/index.html"],
                EntrypointType::Bookmarks,
            ),
            (
                &["devtools.html", "devtools/index.html"],
                EntrypointType::Devtools,
            ),
            (
                &[
                    "sidepanel.html",
                    "sidepanel/index.html",
                    "*.sidepanel.html",
                    "*.sidepanel/index.html",
                ],
                EntrypointType::Sidepanel,
            ),
            (
                &[
                    "sandbox.html",
                    "sandbox/index.html",
                    "*.sandbox.html",
                    "*.sandbox/index.html",
                ],
                EntrypointType::Sandbox,
            ),
            (&["*.html", "*/index.html"], EntrypointType::UnlistedPage),
            (
                &["*.{js,jsx,ts,tsx}", "*/index.{js,jsx,ts,tsx}"],
                EntrypointType::UnlistedScript,
            ),
            (
                &[
                    "*.{css,scss,sass,less,styl}",
                    "*/index.{css,scss,sass,less,styl}",
                ],
                EntrypointType::UnlistedStyle,
            ),
        ];

        rules.iter()
            .map(|(patterns, ty)| {
                let mut builder = GlobSetBuilder::new();
                for pat in *patterns {
                    builder.add(Glob::new(pat).expect("rule table globs are valid"));
                }
                Rule {
                    globs: builder.build().expect("rule table globs compile"),
                    ty: *ty,
                }
            })
            .collect()
    })
}

/// Classify `rel_path` (relative to the entrypoints root, `/`-separated)
/// against the rule table. First match wins.
pub fn rule_for_path(rel_path: &str) -> Option<EntrypointType> {
    rule_table()
        .iter()
        .find(|rule| rule.globs.is_match(rel_path))
        .map(|rule| rule.ty)
}

/// Derive the entrypoint name: the relative path up to the first `.` or
/// path separator.
pub fn derive_name(rel_path: &str) -> &str {
    let end = rel_path
        .find(['.', '/'])
        .unwrap_or(rel_path.len());
    &rel_path[..end]
}

/// Classifies the entrypoints directory of one context.
pub struct EntrypointClassifier<'a> {
    ctx: &'a OrchestratorContext,
    reader: &'a dyn ModuleConfigReader,
}

impl<'a> EntrypointClassifier<'a> {
    pub fn new(ctx: &'a OrchestratorContext, reader: &'a dyn ModuleConfigReader) -> Self {
        Self { ctx, reader }
    }

    /// Discover and classify all entrypoints.
    ///
    /// - Applies `-e/--filter-entrypoint` by marking non-matching
    ///   entrypoints `skipped`.
    /// - Rejects duplicate non-skipped names, listing every conflicting
    ///   path relative to the entrypoints root.
    /// - Applies per-entrypoint browser include/exclude lists (both set →
    ///   warning, entrypoint dropped).
    /// - In serve mode, synthesizes a virtual background entrypoint when the
    ///   user has none, so the reload protocol always has a host.
    pub async fn classify(&self) -> Result<Vec<Entrypoint>> {
        let root = self.ctx.entrypoints_dir();
        let rel_paths = list_entry_files(&root)?;

        let mut entrypoints = Vec::new();
        for rel in &rel_paths {
            let Some(ty) = rule_for_path(rel) else {
                debug!(path = %rel, "no classification rule matched; ignoring");
                continue;
            };

            let name = derive_name(rel).to_string();
            if name.is_empty() {
                debug!(path = %rel, "empty entrypoint name; ignoring");
                continue;
            }

            let input_path = root.join(rel);
            let mut ep = self.build_entrypoint(name, ty, input_path).await?;

            let filters = self.ctx.filter_entrypoints();
            if !filters.is_empty() && !filters.iter().any(|f| f == &ep.name) {
                ep.skipped = true;
            }

            entrypoints.push(ep);
        }

        check_duplicate_names(&root, &entrypoints)?;

        let mut entrypoints = apply_browser_filter(entrypoints, self.ctx.browser);

        if self.ctx.is_serve() && !entrypoints.iter().any(|e| e.is_background() && !e.skipped) {
            debug!("no user background entrypoint; synthesizing virtual background for serve mode");
            entrypoints.push(Entrypoint {
                name: "background".to_string(),
                ty: EntrypointType::Background,
                input_path: root.join("background.js"),
                output_dir: self.ctx.out_dir(),
                options: EntrypointOptions::Background(BackgroundOptions::default()),
                include: None,
                exclude: None,
                skipped: false,
                synthetic: true,
            });
        }

        Ok(entrypoints)
    }

    async fn build_entrypoint(
        &self,
        name: String,
        ty: EntrypointType,
        input_path: PathBuf,
    ) -> Result<Entrypoint> {
        let (options, include, exclude) = match ty {
            EntrypointType::Background => {
                let map = self.read_module_options(&input_path).await?;
                let (map, include, exclude) = split_browser_lists(map);
                let opts: BackgroundOptions = from_option_map(map)?;
                (EntrypointOptions::Background(opts), include, exclude)
            }
            EntrypointType::ContentScript => {
                let map = self.read_module_options(&input_path).await?;
                let (map, include, exclude) = split_browser_lists(map);
                let opts: ContentScriptOptions = from_option_map(map)?;
                (EntrypointOptions::ContentScript(opts), include, exclude)
            }
            t if t.is_html() => {
                let html = std::fs::read_to_string(&input_path)?;
                let meta = parse_html_meta(&html);
                let map: OptionMap = meta
                    .manifest_options
                    .into_iter()
                    .collect::<serde_json::Map<_, _>>();
                let map = resolve_per_browser_map(map, self.ctx.browser);
                let (map, include, exclude) = split_browser_lists(map);
                let mut opts: PageOptions = from_option_map(map)?;
                if opts.title.is_none() {
                    opts.title = meta.title;
                }
                (EntrypointOptions::Page(opts), include, exclude)
            }
            _ => (EntrypointOptions::None, None, None),
        };

        Ok(Entrypoint {
            name,
            ty,
            input_path,
            output_dir: self.ctx.out_dir(),
            options,
            include,
            exclude,
            skipped: false,
            synthetic: false,
        })
    }

    async fn read_module_options(&self, path: &Path) -> Result<OptionMap> {
        let map = self.reader.read(path).await?;
        Ok(resolve_per_browser_map(map, self.ctx.browser))
    }
}

/// Convenience wrapper: classify the entrypoints of `ctx`.
pub async fn classify_entrypoints(
    ctx: &OrchestratorContext,
    reader: &dyn ModuleConfigReader,
) -> Result<Vec<Entrypoint>> {
    EntrypointClassifier::new(ctx, reader).classify().await
}

/// Recursively list candidate entry files under `root`, as sorted
/// `/`-separated relative paths.
///
/// Only two shapes are entrypoint candidates: a file directly under the
/// root, or `<dir>/index.*` one level down. Anything deeper is a module the
/// Builder will pull in through the dependency graph. Hidden files and
/// directories are skipped.
fn list_entry_files(root: &Path) -> Result<Vec<String>> {
    let mut rel_paths = Vec::new();

    if !root.is_dir() {
        return Err(ExtkitError::ConfigError(format!(
            "entrypoints directory {root:?} does not exist"
        )));
    }

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if path.is_file() {
            rel_paths.push(file_name);
        } else if path.is_dir() {
            for sub in std::fs::read_dir(&path)? {
                let sub = sub?;
                let sub_name = sub.file_name().to_string_lossy().into_owned();
                if sub.path().is_file() && sub_name.starts_with("index.") {
                    rel_paths.push(format!("{file_name}/{sub_name}"));
                }
            }
        }
    }

    rel_paths.sort();
    Ok(rel_paths)
}

/// Fatal error if two non-skipped entrypoints reduce to the same name.
fn check_duplicate_names(root: &Path, entrypoints: &[Entrypoint]) -> Result<()> {
    let mut by_name: BTreeMap<&str, Vec<&Entrypoint>> = BTreeMap::new();
    for ep in entrypoints.iter().filter(|e| !e.skipped) {
        by_name.entry(ep.name.as_str()).or_default().push(ep);
    }

    let mut lines = Vec::new();
    for (name, eps) in by_name {
        if eps.len() > 1 {
            let paths: Vec<String> = eps
                .iter()
                .map(|e| {
                    e.input_path
                        .strip_prefix(root)
                        .unwrap_or(&e.input_path)
                        .display()
                        .to_string()
                })
                .collect();
            lines.push(format!("'{}': {}", name, paths.join(", ")));
        }
    }

    if lines.is_empty() {
        Ok(())
    } else {
        Err(ExtkitError::ConfigError(format!(
            "duplicate entrypoint names: {}",
            lines.join("; ")
        )))
    }
}

/// Apply the per-entrypoint browser allow/deny lists.
fn apply_browser_filter(entrypoints: Vec<Entrypoint>, browser: TargetBrowser) -> Vec<Entrypoint> {
    entrypoints
        .into_iter()
        .filter(|ep| {
            match (&ep.include, &ep.exclude) {
                (Some(_), Some(_)) => {
                    warn!(
                        entrypoint = %ep.name,
                        "both include and exclude set; dropping entrypoint"
                    );
                    false
                }
                (_, Some(exclude)) => !exclude.iter().any(|b| b == browser.as_str()),
                (Some(include), _) => include.iter().any(|b| b == browser.as_str()),
                (None, None) => true,
            }
        })
        .collect()
}

/// Keys of the browser allow/deny lists, handled outside the typed options.
fn split_browser_lists(
    mut map: OptionMap,
) -> (OptionMap, Option<Vec<String>>, Option<Vec<String>>) {
    let include = take_string_list(&mut map, "include");
    let exclude = take_string_list(&mut map, "exclude");
    (map, include, exclude)
}

fn take_string_list(map: &mut OptionMap, key: &str) -> Option<Vec<String>> {
    let value = map.remove(key)?;
    match value {
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        serde_json::Value::String(s) => Some(vec![s]),
        _ => None,
    }
}

/// Resolve per-browser option variants: a value of the shape
/// `{"chrome": X, "firefox": Y}` collapses to the variant for the target
/// browser (dropping the key entirely when no variant applies).
fn resolve_per_browser_map(map: OptionMap, browser: TargetBrowser) -> OptionMap {
    let mut resolved = OptionMap::new();
    for (key, value) in map {
        match resolve_per_browser(value, browser) {
            serde_json::Value::Null => {}
            v => {
                resolved.insert(key, v);
            }
        }
    }
    resolved
}

const BROWSER_KEYS: &[&str] = &["chrome", "firefox", "edge", "opera", "safari"];

fn resolve_per_browser(value: serde_json::Value, browser: TargetBrowser) -> serde_json::Value {
    if let serde_json::Value::Object(map) = &value {
        if !map.is_empty() && map.keys().all(|k| BROWSER_KEYS.contains(&k.as_str())) {
            return map
                .get(browser.as_str())
                .cloned()
                .unwrap_or(serde_json::Value::Null);
        }
    }
    value
}

/// Deserialize a typed options struct from an option map, accepting both
/// snake_case and camelCase keys.
fn from_option_map<T: serde::de::DeserializeOwned>(map: OptionMap) -> Result<T> {
    let mut normalized = OptionMap::new();
    for (key, value) in map {
        normalized.insert(camelize(&key), value);
    }
    Ok(serde_json::from_value(serde_json::Value::Object(
        normalized,
    ))?)
}

fn camelize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
