// src/build/output.rs

//! Build output model.
//!
//! A [`BuildOutput`] is the complete result of one build: the assembled
//! manifest, the copied public assets, and one [`BuildStepOutput`] per
//! Builder invocation. In dev mode exactly one "current" `BuildOutput`
//! exists behind an `Arc` and is replaced by whole-reference swap after each
//! successful rebuild — never mutated in place — so concurrent readers
//! always see a fully-consistent snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entrypoint::EntrypointGroup;

/// One file emitted by the Builder or copied from the public directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutputFile {
    /// Compiled JS (or other processed) file; records its dependency set as
    /// the module ids the Builder bundled into it.
    #[serde(rename_all = "camelCase")]
    Chunk {
        file_name: String,
        module_ids: Vec<PathBuf>,
    },
    /// Opaque static file.
    #[serde(rename_all = "camelCase")]
    Asset { file_name: String },
}

impl OutputFile {
    pub fn file_name(&self) -> &str {
        match self {
            OutputFile::Chunk { file_name, .. } => file_name,
            OutputFile::Asset { file_name } => file_name,
        }
    }

    /// Whether this chunk's dependency set contains `path`.
    pub fn depends_on(&self, path: &Path) -> bool {
        match self {
            OutputFile::Chunk { module_ids, .. } => module_ids.iter().any(|m| m == path),
            OutputFile::Asset { .. } => false,
        }
    }
}

/// The chunks produced by building one [`EntrypointGroup`].
///
/// `entrypoints` must exactly equal the group passed to the Builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStepOutput {
    pub entrypoints: EntrypointGroup,
    pub chunks: Vec<OutputFile>,
}

impl BuildStepOutput {
    /// Whether any chunk in this step depends on `path`.
    pub fn depends_on(&self, path: &Path) -> bool {
        self.chunks.iter().any(|c| c.depends_on(path))
    }

    /// Find an output file by its bundle-relative name.
    pub fn find_file(&self, file_name: &str) -> Option<&OutputFile> {
        self.chunks.iter().find(|c| c.file_name() == file_name)
    }
}

/// Everything one build produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub manifest: serde_json::Value,
    pub public_assets: Vec<OutputFile>,
    pub steps: Vec<BuildStepOutput>,
}

impl BuildOutput {
    /// The empty output a full build starts from.
    pub fn empty() -> Self {
        Self {
            manifest: serde_json::Value::Null,
            public_assets: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Look for a file by bundle-relative name across all steps.
    pub fn find_file(&self, file_name: &str) -> Option<&OutputFile> {
        self.steps.iter().find_map(|s| s.find_file(file_name))
    }
}
