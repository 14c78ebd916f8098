// src/logging.rs

//! Logging setup for `vfswatch` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (applies to every target)
//! 2. `VFSWATCH_LOG`, any `EnvFilter` directive such as
//!    `info,vfswatch::watch=debug`
//! 3. `info`
//!
//! Logs go to stderr; the change report on stdout stays machine-readable.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "VFSWATCH_LOG";

/// `notify` is chatty at debug level and rarely what you are after.
const QUIET_DEPENDENCIES: &str = "notify=warn";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// The filter for a CLI level and an optional `VFSWATCH_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let directives = match (cli_level, env) {
        (Some(level), _) => level.as_directive().to_string(),
        (None, Some(env)) if !env.trim().is_empty() => env.trim().to_string(),
        (None, _) => "info".to_string(),
    };
    let directives = if directives.contains("notify") {
        directives
    } else {
        format!("{directives},{QUIET_DEPENDENCIES}")
    };
    EnvFilter::try_new(&directives).with_context(|| format!("invalid {LOG_ENV_VAR} filter '{directives}'"))
}
