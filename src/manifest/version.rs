// src/manifest/version.rs

//! Manifest version simplification.
//!
//! Browsers only accept up to four dot-separated integers in `version`.
//! Anything richer (semver pre-release tags, build metadata) is stripped;
//! the full string survives as `version_name` where the target supports it.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ExtkitError, Result};

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+){0,3}").expect("version regex is valid"))
}

/// Reduce `version` to its manifest-legal prefix (`^\d+(\.\d+){0,3}`).
///
/// `"1.0.0-alpha1"` → `"1.0.0"`; `"1.0.0.1"` → `"1.0.0.1"`. A version that
/// does not start with a digit sequence is a fatal configuration error.
pub fn simplify_version(version: &str) -> Result<String> {
    match version_regex().find(version) {
        Some(m) => Ok(m.as_str().to_string()),
        None => Err(ExtkitError::ConfigError(format!(
            "invalid version '{version}': must start with 1-4 dot-separated numbers"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prerelease_suffix() {
        assert_eq!(simplify_version("1.0.0-alpha1").unwrap(), "1.0.0");
    }

    #[test]
    fn keeps_four_part_versions() {
        assert_eq!(simplify_version("1.0.0.1").unwrap(), "1.0.0.1");
    }

    #[test]
    fn truncates_beyond_four_parts() {
        assert_eq!(simplify_version("1.2.3.4.5").unwrap(), "1.2.3.4");
    }

    #[test]
    fn rejects_non_numeric_versions() {
        assert!(simplify_version("v1.0").is_err());
        assert!(simplify_version("").is_err());
    }
}
