// src/entrypoint/html_meta.rs

//! Option extraction from HTML-backed entrypoints.
//!
//! HTML entrypoints declare their manifest options inline:
//!
//! ```html
//! <title>My Popup</title>
//! <meta name="manifest.mv2_key" content="page_action" />
//! <meta name="manifest.include" content='["chrome", "edge"]' />
//! ```
//!
//! Keys are everything after the `manifest.` prefix. Content is parsed as
//! JSON when possible (single quotes tolerated), otherwise kept as a plain
//! string.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Options extracted from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct HtmlMeta {
    pub title: Option<String>,
    pub manifest_options: BTreeMap<String, serde_json::Value>,
}

fn meta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // The content attribute may be quoted either way so list values can
        // use the other quote style inside.
        Regex::new(
            r#"<meta\s+name\s*=\s*["']manifest\.([A-Za-z_][A-Za-z0-9_.]*)["']\s+content\s*=\s*(?:"([^"]*)"|'([^']*)')\s*/?>"#,
        )
        .expect("meta regex is valid")
    })
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<title>([^<]*)</title>").expect("title regex is valid"))
}

/// Parse `<meta name="manifest.*">` tags and `<title>` out of `html`.
pub fn parse_html_meta(html: &str) -> HtmlMeta {
    let mut meta = HtmlMeta::default();

    if let Some(caps) = title_regex().captures(html) {
        let title = caps[1].trim();
        if !title.is_empty() {
            meta.title = Some(title.to_string());
        }
    }

    for caps in meta_regex().captures_iter(html) {
        let key = caps[1].to_string();
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");
        let value = parse_content_value(raw);
        meta.manifest_options.insert(key, value);
    }

    meta
}

/// Best-effort parse of a meta `content` attribute.
///
/// Tries JSON first, then JSON with single quotes swapped for double quotes
/// (authors frequently write `content="['a', 'b']"`), and falls back to the
/// raw string.
fn parse_content_value(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return v;
    }

    let requoted = trimmed.replace('\'', "\"");
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&requoted) {
        return v;
    }

    serde_json::Value::String(trimmed.to_string())
}
