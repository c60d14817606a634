// src/config/model.rs

use std::str::FromStr;

use serde::Deserialize;

/// Top-level configuration as read from `Extkit.toml`.
///
/// ```toml
/// [project]
/// name = "my-extension"
/// version = "1.0.0"
///
/// [build]
/// browser = "chrome"
/// manifest_version = 3
///
/// [manifest]
/// permissions = ["storage"]
///
/// [commands]
/// builder = "node scripts/bundle.mjs"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub build: BuildSection,

    /// Free-form user manifest fragment, deep-merged over the generated
    /// manifest (user wins on conflict).
    #[serde(default)]
    pub manifest: toml::Table,

    #[serde(default)]
    pub commands: CommandsSection,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub dev: DevSection,
}

/// Validated configuration. Construct via `TryFrom<RawProjectConfig>`.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub build: BuildSection,
    pub manifest: toml::Table,
    pub commands: CommandsSection,
    pub runner: RunnerSection,
    pub dev: DevSection,
}

impl ProjectConfig {
    /// Internal constructor used by validation; callers should go through
    /// `TryFrom<RawProjectConfig>` or [`crate::config::load_and_validate`].
    pub fn new_unchecked(raw: RawProjectConfig) -> Self {
        Self {
            project: raw.project,
            build: raw.build,
            manifest: raw.manifest,
            commands: raw.commands,
            runner: raw.runner,
            dev: raw.dev,
        }
    }

    /// User manifest fragment converted to JSON for merging.
    pub fn manifest_fragment(&self) -> serde_json::Value {
        toml_to_json(&toml::Value::Table(self.manifest.clone()))
    }
}

/// `[project]` section: package metadata and directory layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// Directory scanned for entrypoints, relative to the project root.
    #[serde(default = "default_entrypoints_dir")]
    pub entrypoints_dir: String,

    /// Directory of static files copied verbatim into the bundle.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// Base output directory; per-target bundles land in subdirectories
    /// like `chrome-mv3`.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

fn default_entrypoints_dir() -> String {
    "entrypoints".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_out_dir() -> String {
    ".output".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            version: None,
            entrypoints_dir: default_entrypoints_dir(),
            public_dir: default_public_dir(),
            out_dir: default_out_dir(),
        }
    }
}

/// `[build]` section: default target, overridable from the CLI.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    /// `"chrome"`, `"firefox"`, `"edge"`, `"opera"` or `"safari"`.
    #[serde(default)]
    pub browser: Option<String>,

    /// 2 or 3.
    #[serde(default)]
    pub manifest_version: Option<u8>,
}

/// `[commands]` section: the external collaborators this tool drives.
///
/// Each value is a shell command. The Builder command receives a JSON build
/// request on stdin and must print a JSON chunk listing on stdout; see
/// [`crate::build::backend::CommandBuilder`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandsSection {
    /// Bundler invoked once per entrypoint group.
    #[serde(default)]
    pub builder: Option<String>,

    /// Evaluates a script entrypoint's declarative options without running
    /// its `main` function; prints JSON on stdout.
    #[serde(default)]
    pub config_reader: Option<String>,

    /// Packages the output directory (used by `extkit zip`).
    #[serde(default)]
    pub zip: Option<String>,
}

/// `[runner]` section: how to open a browser with the built extension.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunnerSection {
    /// Command that launches the browser. `{out_dir}` is substituted with
    /// the absolute bundle directory.
    #[serde(default)]
    pub command: Option<String>,

    /// Optional extra runner config file. Changes to this file in dev mode
    /// restart the browser (not the whole server).
    #[serde(default)]
    pub config_file: Option<String>,
}

/// `[dev]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DevSection {
    /// Port for the dev/reload server.
    #[serde(default = "default_dev_port")]
    pub port: u16,

    /// Debounce window for coalescing watcher events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_dev_port() -> u16 {
    3000
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for DevSection {
    fn default() -> Self {
        Self {
            port: default_dev_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Target browser for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetBrowser {
    Chrome,
    Firefox,
    Edge,
    Opera,
    Safari,
}

impl Default for TargetBrowser {
    fn default() -> Self {
        TargetBrowser::Chrome
    }
}

impl TargetBrowser {
    pub fn is_firefox(self) -> bool {
        self == TargetBrowser::Firefox
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetBrowser::Chrome => "chrome",
            TargetBrowser::Firefox => "firefox",
            TargetBrowser::Edge => "edge",
            TargetBrowser::Opera => "opera",
            TargetBrowser::Safari => "safari",
        }
    }
}

impl FromStr for TargetBrowser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(TargetBrowser::Chrome),
            "firefox" => Ok(TargetBrowser::Firefox),
            "edge" => Ok(TargetBrowser::Edge),
            "opera" => Ok(TargetBrowser::Opera),
            "safari" => Ok(TargetBrowser::Safari),
            other => Err(format!(
                "invalid browser: {other} (expected chrome, firefox, edge, opera or safari)"
            )),
        }
    }
}

/// Target manifest schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestVersion {
    V2,
    V3,
}

impl ManifestVersion {
    pub fn as_u64(self) -> u64 {
        match self {
            ManifestVersion::V2 => 2,
            ManifestVersion::V3 => 3,
        }
    }
}

/// Build mode; controls manifest formatting and dev-only additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

/// Convert a TOML value into the equivalent JSON value.
///
/// TOML datetimes are stringified; manifests have no use for them anyway.
pub fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s.clone()),
        toml::Value::Integer(i) => serde_json::Value::from(*i),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let mut map = serde_json::Map::new();
            for (k, v) in table {
                map.insert(k.clone(), toml_to_json(v));
            }
            serde_json::Value::Object(map)
        }
    }
}
