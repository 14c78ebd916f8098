// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::ConfigFile;
use crate::errors::{Result, VfsError};
use crate::types::{VfsLogging, WatchMode, WatchStrategySetting};

/// Command-line arguments for `vfswatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vfswatch",
    version,
    about = "Watch a project tree and report which fingerprinted inputs changed between builds.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Relative input roots resolve against
    /// its directory.
    #[arg(long, value_name = "PATH", default_value = "Vfswatch.toml")]
    pub config: String,

    /// Run a single build, print the report and exit without watching.
    #[arg(long)]
    pub once: bool,

    /// Override `[config].watch_mode` (enabled, default, disabled).
    #[arg(long, value_name = "MODE")]
    pub watch_mode: Option<WatchMode>,

    /// Override `[config].watch_strategy` (auto, hierarchical, non_hierarchical).
    #[arg(long, value_name = "STRATEGY")]
    pub watch_strategy: Option<WatchStrategySetting>,

    /// Override `[config].max_hierarchies`.
    #[arg(long, value_name = "N")]
    pub max_hierarchies: Option<usize>,

    /// Log retained-state statistics at every build boundary.
    #[arg(long)]
    pub verbose_vfs: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VFSWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved inputs, but don't snapshot anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, cfg: &mut ConfigFile) -> Result<()> {
        if let Some(mode) = self.watch_mode {
            cfg.config.watch_mode = mode;
        }
        if let Some(strategy) = self.watch_strategy {
            cfg.config.watch_strategy = strategy;
        }
        if let Some(max) = self.max_hierarchies {
            if max == 0 {
                return Err(VfsError::ConfigError("--max-hierarchies must be >= 1".to_string()));
            }
            cfg.config.max_hierarchies = max;
        }
        if self.verbose_vfs {
            cfg.config.vfs_logging = VfsLogging::Verbose;
        }
        Ok(())
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
