// tests/cli_overrides.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, InputConfigBuilder};
use crate::common::init_tracing;

use clap::Parser;

use vfswatch::cli::{CliArgs, LogLevel};
use vfswatch::errors::VfsError;
use vfswatch::logging::build_filter;
use vfswatch::types::{VfsLogging, WatchMode, WatchStrategySetting};

fn config() -> vfswatch::config::ConfigFile {
    ConfigFileBuilder::new()
        .with_input("sources", InputConfigBuilder::new("src").build())
        .build()
}

#[test]
fn defaults_leave_the_config_alone() {
    init_tracing();

    let args = CliArgs::try_parse_from(["vfswatch"]).unwrap();
    assert_eq!(args.config, "Vfswatch.toml");
    assert!(!args.once);

    let mut cfg = config();
    args.apply_overrides(&mut cfg).unwrap();
    assert_eq!(cfg.config.watch_mode, WatchMode::Default);
    assert_eq!(cfg.config.max_hierarchies, 50);
    assert_eq!(cfg.config.vfs_logging, VfsLogging::Normal);
}

#[test]
fn flags_override_watch_settings() {
    init_tracing();

    let args = CliArgs::try_parse_from([
        "vfswatch",
        "--watch-mode",
        "disabled",
        "--watch-strategy",
        "non-hierarchical",
        "--max-hierarchies",
        "4",
        "--verbose-vfs",
        "--once",
    ])
    .unwrap();

    let mut cfg = config();
    args.apply_overrides(&mut cfg).unwrap();
    assert_eq!(cfg.config.watch_mode, WatchMode::Disabled);
    assert_eq!(cfg.config.watch_strategy, WatchStrategySetting::NonHierarchical);
    assert_eq!(cfg.config.max_hierarchies, 4);
    assert_eq!(cfg.config.vfs_logging, VfsLogging::Verbose);
    assert!(args.once);
}

#[test]
fn invalid_overrides_are_rejected() {
    init_tracing();

    assert!(CliArgs::try_parse_from(["vfswatch", "--watch-mode", "sometimes"]).is_err());

    let args = CliArgs::try_parse_from(["vfswatch", "--max-hierarchies", "0"]).unwrap();
    let err = args.apply_overrides(&mut config()).unwrap_err();
    assert!(matches!(err, VfsError::ConfigError(_)));
}

#[test]
fn log_filter_prefers_the_cli_level() {
    init_tracing();

    let filter = build_filter(Some(LogLevel::Debug), Some("trace")).unwrap();
    let rendered = filter.to_string();
    assert!(rendered.contains("notify=warn"));
    assert!(rendered.contains("debug"));
    assert!(!rendered.contains("trace"));

    let filter = build_filter(None, Some("info,vfswatch::watch=trace")).unwrap();
    assert!(filter.to_string().contains("vfswatch::watch=trace"));

    assert!(build_filter(None, Some("   ")).is_ok());
    assert!(build_filter(None, Some("vfswatch=loud")).is_err());
}
