// src/dev/protocol.rs

//! Hot-reload wire protocol.
//!
//! JSON messages exchanged with the extension over the reload WebSocket.
//!
//! Outbound (server → extension):
//! - `wxt:reload-extension` — reload the whole extension, no payload.
//! - `wxt:reload-page` — reload one page, payload is the bundle-relative
//!   path.
//! - `wxt:reload-content-script` — unregister + re-register one content
//!   script, payload is the resolved registration.
//!
//! Inbound (extension → server):
//! - `wxt:background-initialized` — the background started; in MV3 dev mode
//!   this triggers the first-time runtime registration of content scripts,
//!   since they are absent from the manifest.

use serde::{Deserialize, Serialize};

use crate::entrypoint::{Registration, RunAt, ScriptWorld};
use crate::manifest::content_scripts::ResolvedContentScript;

/// Resolved content-script registration sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentScriptPayload {
    pub matches: Vec<String>,
    pub js: Vec<String>,
    pub css: Vec<String>,
    pub run_at: RunAt,
    pub all_frames: bool,
    pub exclude_matches: Vec<String>,
    pub world: ScriptWorld,
}

impl ContentScriptPayload {
    /// Build the payload from a resolved declaration plus output paths.
    pub fn from_resolved(
        resolved: &ResolvedContentScript,
        js: Vec<String>,
        css: Vec<String>,
    ) -> Self {
        Self {
            matches: resolved.matches.clone(),
            js,
            css,
            run_at: resolved.run_at,
            all_frames: resolved.all_frames,
            exclude_matches: resolved.exclude_matches.clone(),
            world: resolved.world,
        }
    }
}

/// One reload-protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReloadMessage {
    #[serde(rename = "wxt:reload-extension")]
    ReloadExtension,

    #[serde(rename = "wxt:reload-page")]
    ReloadPage { path: String },

    #[serde(rename = "wxt:reload-content-script")]
    #[serde(rename_all = "camelCase")]
    ReloadContentScript {
        registration: Registration,
        content_script: ContentScriptPayload,
    },

    #[serde(rename = "wxt:background-initialized")]
    BackgroundInitialized,
}

impl ReloadMessage {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"wxt:reload-extension"}"#.to_string())
    }

    /// Parse from a JSON string.
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
