// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtkitError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Structural validation failure across entrypoints. The message lists
    /// every offending path, not just the first one found.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Build error in group '{group}': {message}")]
    BuildError { group: String, message: String },

    /// A source file failed to load or parse while the Builder was compiling
    /// it. Recoverable in dev mode: the dispatcher re-arms on `path` and
    /// retries once that file changes again.
    #[error("Syntax error in {}: {message}", path.display())]
    SyntaxError {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExtkitError {
    /// Whether dev mode may swallow this error and retry later instead of
    /// tearing the server down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExtkitError::SyntaxError { .. })
    }

    /// The broken source file for recoverable errors.
    pub fn failing_path(&self) -> Option<&std::path::Path> {
        match self {
            ExtkitError::SyntaxError { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExtkitError>;
