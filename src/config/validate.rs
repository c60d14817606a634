// src/config/validate.rs

use std::str::FromStr;

use crate::config::model::{ProjectConfig, RawProjectConfig, TargetBrowser};
use crate::errors::{ExtkitError, Result};

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = ExtkitError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ProjectConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawProjectConfig) -> Result<()> {
    validate_build_section(cfg)?;
    validate_dev_section(cfg)?;
    Ok(())
}

fn validate_build_section(cfg: &RawProjectConfig) -> Result<()> {
    if let Some(browser) = &cfg.build.browser {
        TargetBrowser::from_str(browser).map_err(ExtkitError::ConfigError)?;
    }

    if let Some(mv) = cfg.build.manifest_version {
        if mv != 2 && mv != 3 {
            return Err(ExtkitError::ConfigError(format!(
                "[build].manifest_version must be 2 or 3 (got {mv})"
            )));
        }
    }

    Ok(())
}

fn validate_dev_section(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.dev.debounce_ms == 0 {
        return Err(ExtkitError::ConfigError(
            "[dev].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
