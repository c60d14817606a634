// src/entrypoint/validate.rs

//! Structural validation of classified entrypoints.
//!
//! Runs before every full build. Errors are collected across the whole
//! entrypoint list and reported together, so the user fixes everything in
//! one pass instead of one file per build attempt.

use crate::entrypoint::Entrypoint;
use crate::errors::{ExtkitError, Result};

/// Validate the classified entrypoint list.
///
/// - Content scripts must declare at least one `matches` pattern.
/// - `include` and `exclude` browser lists are mutually exclusive.
///
/// The classifier drops entrypoints with both lists set (warning), so the
/// second check only fires for programmatically constructed lists.
pub fn validate_entrypoints(entrypoints: &[Entrypoint]) -> Result<()> {
    let mut problems = Vec::new();

    for ep in entrypoints.iter().filter(|e| !e.skipped) {
        if let Some(opts) = ep.options.as_content_script() {
            if opts.matches.is_empty() {
                problems.push(format!(
                    "content script '{}' ({}) must declare `matches`",
                    ep.name,
                    ep.input_path.display()
                ));
            }
        }

        if ep.include.is_some() && ep.exclude.is_some() {
            problems.push(format!(
                "entrypoint '{}' ({}) sets both `include` and `exclude`; they are mutually exclusive",
                ep.name,
                ep.input_path.display()
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ExtkitError::ValidationError(problems.join("\n")))
    }
}
