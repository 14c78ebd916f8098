// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, VfsError};
use crate::snapshot::filter::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::VfsError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.input))
    }
}

/// Run every check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_inputs(cfg)?;
    validate_global_config(cfg)?;
    validate_inputs(cfg)?;
    Ok(())
}

fn ensure_has_inputs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.input.is_empty() {
        return Err(VfsError::ConfigError(
            "config must contain at least one [input.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let config = &cfg.config;
    if config.max_hierarchies == 0 {
        return Err(VfsError::ConfigError(
            "[config].max_hierarchies must be >= 1 (got 0)".to_string(),
        ));
    }
    if config.queue_capacity == 0 {
        return Err(VfsError::ConfigError(
            "[config].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if config.quiet_period_ms > config.max_wait_ms {
        return Err(VfsError::ConfigError(format!(
            "[config].quiet_period_ms ({}) must not exceed max_wait_ms ({})",
            config.quiet_period_ms, config.max_wait_ms
        )));
    }
    if config.probe_dir.is_empty() || config.probe_dir.contains(['/', '\\']) {
        return Err(VfsError::ConfigError(format!(
            "[config].probe_dir must be a single directory name (got '{}')",
            config.probe_dir
        )));
    }
    build_globset(&cfg.default.exclude).map_err(|err| {
        VfsError::ConfigError(format!("[default] has an invalid `exclude` pattern: {err:#}"))
    })?;
    Ok(())
}

fn validate_inputs(cfg: &RawConfigFile) -> Result<()> {
    for (name, input) in cfg.input.iter() {
        if input.roots.is_empty() {
            return Err(VfsError::ConfigError(format!(
                "input '{}' must list at least one root",
                name
            )));
        }
        for (field, patterns) in [("include", &input.include), ("exclude", &input.exclude)] {
            build_globset(patterns).map_err(|err| {
                VfsError::ConfigError(format!("input '{}' has an invalid `{}` pattern: {:#}", name, field, err))
            })?;
        }
    }
    Ok(())
}
