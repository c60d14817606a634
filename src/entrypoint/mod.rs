// src/entrypoint/mod.rs

//! Entrypoint discovery and typing.
//!
//! - [`classify`] maps files under the entrypoints directory to typed
//!   [`Entrypoint`] records via an ordered glob rule table.
//! - [`html_meta`] extracts options from `<meta name="manifest.*">` tags and
//!   `<title>` in HTML-backed entrypoints.
//! - [`reader`] is the external Module Config Reader boundary for
//!   script-backed entrypoints.
//! - [`group`] batches entrypoints into build steps.
//! - [`validate`] runs structural validation before a build starts.

pub mod classify;
pub mod group;
pub mod html_meta;
pub mod reader;
pub mod validate;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use classify::{classify_entrypoints, EntrypointClassifier};
pub use group::group_entrypoints;
pub use reader::{CommandConfigReader, ModuleConfigReader, NullConfigReader};
pub use validate::validate_entrypoints;

/// Canonical entrypoint name type used throughout the engine.
pub type EntrypointName = String;

/// What kind of deliverable an entrypoint produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntrypointType {
    Background,
    ContentScript,
    Popup,
    Options,
    Newtab,
    History,
    Bookmarks,
    Devtools,
    Sidepanel,
    Sandbox,
    UnlistedPage,
    UnlistedScript,
    UnlistedStyle,
}

impl EntrypointType {
    /// HTML-backed types: built as pages, reloadable in place.
    pub fn is_html(self) -> bool {
        matches!(
            self,
            EntrypointType::Popup
                | EntrypointType::Options
                | EntrypointType::Newtab
                | EntrypointType::History
                | EntrypointType::Bookmarks
                | EntrypointType::Devtools
                | EntrypointType::Sidepanel
                | EntrypointType::Sandbox
                | EntrypointType::UnlistedPage
        )
    }
}

/// Module output format for script entrypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Self-contained immediately-invoked bundle (default).
    #[default]
    Iife,
    /// ES module; may share chunks with the page bundle.
    #[serde(rename = "module")]
    Esm,
}

/// `run_at` values from the content-script manifest schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
}

/// JavaScript world a content script executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptWorld {
    Isolated,
    Main,
}

/// How a content script gets registered in the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registration {
    #[default]
    Manifest,
    Runtime,
}

/// Declarative options of a content-script entrypoint.
///
/// `None` fields mean "not set"; the manifest assembler substitutes the
/// schema defaults when computing the grouping signature, so an explicit
/// default and an omitted field produce the same manifest entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentScriptOptions {
    pub matches: Vec<String>,
    pub exclude_matches: Option<Vec<String>>,
    pub include_globs: Option<Vec<String>>,
    pub exclude_globs: Option<Vec<String>>,
    pub run_at: Option<RunAt>,
    pub all_frames: Option<bool>,
    pub match_about_blank: Option<bool>,
    pub match_origin_as_fallback: Option<bool>,
    pub world: Option<ScriptWorld>,
    pub registration: Option<Registration>,
    /// Output format; `module` scripts join a shared ESM group.
    #[serde(rename = "type")]
    pub format: Option<ModuleFormat>,
}

/// Declarative options of the background entrypoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundOptions {
    /// MV2 only: `background.persistent`.
    pub persistent: Option<bool>,
    /// Output format; `module` backgrounds join the shared ESM group.
    #[serde(rename = "type")]
    pub format: Option<ModuleFormat>,
}

/// Manifest key used for the popup on MV2 targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mv2Key {
    BrowserAction,
    PageAction,
}

/// Options of an HTML-backed entrypoint, parsed from `<meta>`/`<title>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageOptions {
    /// `<title>`; used as `default_title` for popups.
    pub title: Option<String>,
    /// Popup only: which MV2 action key to emit.
    pub mv2_key: Option<Mv2Key>,
    /// Options page only: `browser_style`/`chrome_style` toggle.
    pub browser_style: Option<bool>,
    /// Options page only: `options_ui.open_in_tab`.
    pub open_in_tab: Option<bool>,
}

/// Type-specific options of an entrypoint.
#[derive(Debug, Clone, PartialEq)]
pub enum EntrypointOptions {
    Background(BackgroundOptions),
    ContentScript(ContentScriptOptions),
    Page(PageOptions),
    /// Unlisted scripts and styles carry no options.
    None,
}

impl EntrypointOptions {
    pub fn as_background(&self) -> Option<&BackgroundOptions> {
        match self {
            EntrypointOptions::Background(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_content_script(&self) -> Option<&ContentScriptOptions> {
        match self {
            EntrypointOptions::ContentScript(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&PageOptions> {
        match self {
            EntrypointOptions::Page(o) => Some(o),
            _ => None,
        }
    }
}

/// One classified input producing one build deliverable.
#[derive(Debug, Clone, PartialEq)]
pub struct Entrypoint {
    /// Unique within a build (among non-skipped entrypoints).
    pub name: EntrypointName,
    pub ty: EntrypointType,
    /// Absolute path of the source file.
    pub input_path: PathBuf,
    /// Absolute bundle directory this entrypoint's output lands in.
    pub output_dir: PathBuf,
    pub options: EntrypointOptions,
    /// Browser allow-list from the entrypoint's own options.
    pub include: Option<Vec<String>>,
    /// Browser deny-list from the entrypoint's own options.
    pub exclude: Option<Vec<String>>,
    /// Excluded from output but still known (e.g. `-e` filtering).
    pub skipped: bool,
    /// Serve-mode virtual background with no user source file.
    pub synthetic: bool,
}

impl Entrypoint {
    pub fn is_background(&self) -> bool {
        self.ty == EntrypointType::Background
    }

    pub fn is_content_script(&self) -> bool {
        self.ty == EntrypointType::ContentScript
    }

    pub fn is_html(&self) -> bool {
        self.ty.is_html()
    }

    /// Bundle-relative path of this entrypoint's entry output file.
    ///
    /// This is the naming contract with the Builder: `<name>.html` for
    /// pages, `content-scripts/<name>.js` for content scripts, `<name>.js`
    /// for other scripts, `<name>.css` for styles.
    pub fn entry_file_name(&self) -> String {
        match self.ty {
            t if t.is_html() => format!("{}.html", self.name),
            EntrypointType::ContentScript => format!("content-scripts/{}.js", self.name),
            EntrypointType::UnlistedStyle => format!("{}.css", self.name),
            _ => format!("{}.js", self.name),
        }
    }

    /// Output format, for the types that have one.
    pub fn module_format(&self) -> ModuleFormat {
        match &self.options {
            EntrypointOptions::Background(o) => o.format.unwrap_or_default(),
            EntrypointOptions::ContentScript(o) => o.format.unwrap_or_default(),
            _ => ModuleFormat::Iife,
        }
    }
}

/// One or more entrypoints compiled together in a single Builder call.
#[derive(Debug, Clone, PartialEq)]
pub enum EntrypointGroup {
    Single(Entrypoint),
    Shared(Vec<Entrypoint>),
}

impl EntrypointGroup {
    pub fn members(&self) -> &[Entrypoint] {
        match self {
            EntrypointGroup::Single(ep) => std::slice::from_ref(ep),
            EntrypointGroup::Shared(eps) => eps,
        }
    }

    /// Human-readable label for logs and build errors.
    pub fn label(&self) -> String {
        self.members()
            .iter()
            .map(|ep| ep.name.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn contains_background(&self) -> bool {
        self.members().iter().any(Entrypoint::is_background)
    }
}
