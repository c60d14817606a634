// src/manifest/content_scripts.rs

//! Content-script grouping.
//!
//! Multiple content-script entrypoints frequently share one declaration
//! (same matches, same run_at, ...). Writing one `content_scripts[]` entry
//! per file would bloat the manifest and make its content depend on file
//! discovery order. Instead every entrypoint's options are canonicalised
//! into a **group signature**; entrypoints with identical signatures merge
//! into a single entry whose `js`/`css` arrays are the sorted union of the
//! members' compiled output paths.
//!
//! Canonicalisation: fill in the schema default for every omitted option,
//! sort every array-valued field, serialize as `[key, value]` pairs sorted
//! by key, stringify, and hash. An explicit `allFrames: false` therefore
//! signs identically to an omitted one, and field/array ordering never
//! matters.

use serde::Serialize;

use crate::build::output::BuildStepOutput;
use crate::entrypoint::{ContentScriptOptions, Entrypoint, RunAt, ScriptWorld};

/// A content-script declaration with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContentScript {
    pub matches: Vec<String>,
    pub exclude_matches: Vec<String>,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub match_about_blank: bool,
    pub match_origin_as_fallback: bool,
    pub run_at: RunAt,
    pub all_frames: bool,
    pub world: ScriptWorld,
}

/// Fill defaults for every omitted option and sort all array fields.
pub fn resolve_options(opts: &ContentScriptOptions) -> ResolvedContentScript {
    let mut resolved = ResolvedContentScript {
        matches: opts.matches.clone(),
        exclude_matches: opts.exclude_matches.clone().unwrap_or_default(),
        include_globs: opts.include_globs.clone().unwrap_or_default(),
        exclude_globs: opts.exclude_globs.clone().unwrap_or_default(),
        match_about_blank: opts.match_about_blank.unwrap_or(false),
        match_origin_as_fallback: opts.match_origin_as_fallback.unwrap_or(false),
        run_at: opts.run_at.unwrap_or(RunAt::DocumentIdle),
        all_frames: opts.all_frames.unwrap_or(false),
        world: opts.world.unwrap_or(ScriptWorld::Isolated),
    };

    resolved.matches.sort();
    resolved.exclude_matches.sort();
    resolved.include_globs.sort();
    resolved.exclude_globs.sort();
    resolved
}

/// Canonical signature of one resolved declaration.
///
/// Semantically equivalent declarations hash identically regardless of
/// field ordering, array ordering, or default-vs-explicit values.
pub fn group_signature(resolved: &ResolvedContentScript) -> String {
    let value = serde_json::to_value(resolved).expect("resolved options serialize");
    let obj = value.as_object().expect("resolved options are an object");

    let mut pairs: Vec<(&String, &serde_json::Value)> = obj.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());

    let canonical =
        serde_json::to_string(&pairs).expect("canonical pair list serializes");
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// One merged `content_scripts[]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentScriptEntry {
    pub declaration: ResolvedContentScript,
    pub js: Vec<String>,
    pub css: Vec<String>,
}

/// Merge content-script entrypoints into manifest entries.
///
/// Declarative fields are copied from each group's first member; `js`/`css`
/// are the sorted union of the members' compiled output paths. Entry order
/// follows the first occurrence of each signature, which is stable because
/// classification sorts entrypoints by path.
pub fn group_content_scripts(
    content_scripts: &[&Entrypoint],
    steps: &[BuildStepOutput],
) -> Vec<ContentScriptEntry> {
    let mut entries: Vec<(String, ContentScriptEntry)> = Vec::new();

    for ep in content_scripts {
        let Some(opts) = ep.options.as_content_script() else {
            continue;
        };
        let resolved = resolve_options(opts);
        let signature = group_signature(&resolved);

        let js = ep.entry_file_name();
        let css = find_css_asset(steps, &ep.name);

        match entries.iter_mut().find(|(sig, _)| *sig == signature) {
            Some((_, entry)) => {
                entry.js.push(js);
                if let Some(css) = css {
                    entry.css.push(css);
                }
            }
            None => entries.push((
                signature,
                ContentScriptEntry {
                    declaration: resolved,
                    js: vec![js],
                    css: css.into_iter().collect(),
                },
            )),
        }
    }

    entries
        .into_iter()
        .map(|(_, mut entry)| {
            entry.js.sort();
            entry.js.dedup();
            entry.css.sort();
            entry.css.dedup();
            entry
        })
        .collect()
}

/// CSS emitted for a content script lives at `assets/<name>.css`; absence
/// means the script has no style output.
pub fn find_css_asset(steps: &[BuildStepOutput], entrypoint_name: &str) -> Option<String> {
    let wanted = format!("assets/{entrypoint_name}.css");
    steps
        .iter()
        .find_map(|step| step.find_file(&wanted))
        .map(|f| f.file_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(matches: &[&str]) -> ContentScriptOptions {
        ContentScriptOptions {
            matches: matches.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn signature_ignores_array_order() {
        let a = options(&["*://google.com/*", "*://duckduckgo.com/*"]);
        let b = options(&["*://duckduckgo.com/*", "*://google.com/*"]);
        assert_eq!(
            group_signature(&resolve_options(&a)),
            group_signature(&resolve_options(&b))
        );
    }

    #[test]
    fn signature_ignores_explicit_defaults() {
        let implicit = options(&["*://example.com/*"]);
        let explicit = ContentScriptOptions {
            all_frames: Some(false),
            run_at: Some(RunAt::DocumentIdle),
            world: Some(ScriptWorld::Isolated),
            exclude_matches: Some(vec![]),
            ..options(&["*://example.com/*"])
        };
        assert_eq!(
            group_signature(&resolve_options(&implicit)),
            group_signature(&resolve_options(&explicit))
        );
    }

    #[test]
    fn signature_distinguishes_real_differences() {
        let idle = options(&["*://example.com/*"]);
        let start = ContentScriptOptions {
            run_at: Some(RunAt::DocumentStart),
            ..options(&["*://example.com/*"])
        };
        assert_ne!(
            group_signature(&resolve_options(&idle)),
            group_signature(&resolve_options(&start))
        );
    }
}
