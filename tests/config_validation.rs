// tests/config_validation.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, InputConfigBuilder};
use crate::common::init_tracing;

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use vfswatch::config::{ConfigFile, RawConfigFile, load_and_validate, load_from_path};
use vfswatch::errors::VfsError;
use vfswatch::types::{NormalizerKind, VfsLogging, WatchMode, WatchStrategySetting};

fn expect_config_error(raw: RawConfigFile, needle: &str) {
    match ConfigFile::try_from(raw) {
        Err(VfsError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'");
        }
        other => panic!("expected ConfigError mentioning '{needle}', got {other:?}"),
    }
}

fn one_input() -> ConfigFileBuilder {
    ConfigFileBuilder::new().with_input("sources", InputConfigBuilder::new("src").build())
}

#[test]
fn defaults_apply_to_missing_sections() {
    init_tracing();

    let raw: RawConfigFile = toml::from_str(
        r#"
[input.sources]
roots = ["src"]
"#,
    )
    .unwrap();
    let cfg = ConfigFile::try_from(raw).unwrap();

    assert_eq!(cfg.config.watch_mode, WatchMode::Default);
    assert_eq!(cfg.config.watch_strategy, WatchStrategySetting::Auto);
    assert_eq!(cfg.config.vfs_logging, VfsLogging::Normal);
    assert_eq!(cfg.config.max_hierarchies, 50);
    assert_eq!(cfg.config.probe_dir, ".vfswatch");
    assert_eq!(cfg.config.quiet_period().as_millis(), 1_000);
    assert_eq!(cfg.config.max_wait().as_millis(), 10_000);

    let input = &cfg.input["sources"];
    assert_eq!(input.normalizer, NormalizerKind::Relative);
    assert!(!input.include_missing);
    assert!(!input.ignore_directories);
    assert!(!input.ordered);
}

#[test]
fn at_least_one_input_is_required() {
    init_tracing();

    expect_config_error(ConfigFileBuilder::new().build_raw(), "at least one [input");
}

#[test]
fn watch_limits_must_be_positive() {
    init_tracing();

    expect_config_error(one_input().with_max_hierarchies(0).build_raw(), "max_hierarchies");

    let mut raw = one_input().build_raw();
    raw.config.queue_capacity = 0;
    expect_config_error(raw, "queue_capacity");
}

#[test]
fn quiet_period_cannot_exceed_max_wait() {
    init_tracing();

    let mut raw = one_input().build_raw();
    raw.config.quiet_period_ms = 500;
    raw.config.max_wait_ms = 100;
    expect_config_error(raw, "quiet_period_ms (500)");

    let mut raw = one_input().build_raw();
    raw.config.quiet_period_ms = 100;
    raw.config.max_wait_ms = 100;
    assert!(ConfigFile::try_from(raw).is_ok());
}

#[test]
fn probe_dir_must_be_a_single_name() {
    init_tracing();

    for bad in ["", "a/b", "a\\b"] {
        let mut raw = one_input().build_raw();
        raw.config.probe_dir = bad.to_string();
        expect_config_error(raw, "probe_dir");
    }
}

#[test]
fn inputs_need_roots_and_valid_globs() {
    init_tracing();

    let mut no_roots = InputConfigBuilder::new("src").build();
    no_roots.roots.clear();
    expect_config_error(
        ConfigFileBuilder::new().with_input("empty", no_roots).build_raw(),
        "input 'empty' must list at least one root",
    );

    let bad_include = InputConfigBuilder::new("src").include("src/[unclosed").build();
    expect_config_error(
        ConfigFileBuilder::new().with_input("broken", bad_include).build_raw(),
        "invalid `include` pattern",
    );

    let bad_exclude = InputConfigBuilder::new("src").exclude("{a,b").build();
    expect_config_error(
        ConfigFileBuilder::new().with_input("broken", bad_exclude).build_raw(),
        "invalid `exclude` pattern",
    );
}

#[test]
fn default_excludes_must_compile() {
    init_tracing();

    let mut raw = one_input().build_raw();
    raw.default.exclude = vec!["**/*.{tmp,bak".to_string()];
    expect_config_error(raw, "[default] has an invalid `exclude` pattern");

    let mut raw = one_input().build_raw();
    raw.default.exclude = vec!["**/*.{tmp,bak}".to_string(), "**/[Tt]humbs.db".to_string()];
    assert!(ConfigFile::try_from(raw).is_ok());
}

#[test]
fn unknown_keys_are_rejected() {
    init_tracing();

    let in_config = toml::from_str::<RawConfigFile>(
        r#"
[config]
watch_mod = "enabled"

[input.sources]
roots = ["src"]
"#,
    );
    assert!(in_config.is_err());

    let in_input = toml::from_str::<RawConfigFile>(
        r#"
[input.sources]
roots = ["src"]
normaliser = "absolute"
"#,
    );
    assert!(in_input.is_err());
}

#[test]
fn probe_directory_is_always_excluded() {
    init_tracing();

    let mut raw = one_input().build_raw();
    raw.default.exclude = vec!["**/target/**".to_string()];
    raw.config.probe_dir = ".probe".to_string();
    let cfg = ConfigFile::try_from(raw).unwrap();

    assert_eq!(
        cfg.default_excludes(),
        vec!["**/target/**".to_string(), "**/.probe/**".to_string()]
    );

    // Already listed, so not repeated.
    let cfg = one_input().build();
    let excludes = cfg.default_excludes();
    assert_eq!(excludes.iter().filter(|e| *e == "**/.vfswatch/**").count(), 1);
}

#[test]
fn relative_locations_resolve_against_the_base_dir() {
    init_tracing();

    let mut raw = ConfigFileBuilder::new()
        .with_input(
            "classpath",
            InputConfigBuilder::new("lib/a.jar").root("/opt/shared/b.jar").ordered(true).build(),
        )
        .build_raw();
    raw.config.hierarchies = vec!["../sibling".to_string()];
    raw.config.immutable_locations = vec!["/opt/jdk".to_string(), "cache".to_string()];
    let cfg = ConfigFile::try_from(raw).unwrap().with_base_dir("/work/proj");

    assert_eq!(
        cfg.input_roots(&cfg.input["classpath"]),
        vec![PathBuf::from("/work/proj/lib/a.jar"), PathBuf::from("/opt/shared/b.jar")]
    );
    assert_eq!(
        cfg.watchable_hierarchies(),
        vec![PathBuf::from("/work/proj"), PathBuf::from("/work/proj/../sibling")]
    );
    assert_eq!(
        cfg.immutable_locations(),
        vec![PathBuf::from("/opt/jdk"), PathBuf::from("/work/proj/cache")]
    );
}

#[test]
fn load_and_validate_uses_the_config_directory() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Vfswatch.toml");
    std::fs::write(
        &path,
        r#"
[config]
watch_mode = "enabled"
watch_strategy = "hierarchical"
vfs_logging = "verbose"
max_hierarchies = 3

[input.sources]
roots = ["src"]
normalizer = "name_only"
include = ["**/*.java"]
include_missing = true
"#,
    )
    .unwrap();

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.base_dir, dir.path().canonicalize().unwrap());
    assert_eq!(cfg.config.watch_mode, WatchMode::Enabled);
    assert_eq!(cfg.config.watch_strategy, WatchStrategySetting::Hierarchical);
    assert_eq!(cfg.config.vfs_logging, VfsLogging::Verbose);
    assert_eq!(cfg.config.max_hierarchies, 3);

    let input = &cfg.input["sources"];
    assert_eq!(input.normalizer, NormalizerKind::NameOnly);
    assert!(input.include_missing);
    assert_eq!(cfg.input_roots(input), vec![cfg.base_dir.join("src")]);
}

#[test]
fn load_errors_are_structured() {
    init_tracing();

    let missing = load_from_path("/definitely/not/here/Vfswatch.toml").unwrap_err();
    assert!(matches!(missing, VfsError::IoError(_)));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[input.sources\nroots = 1").unwrap();
    let malformed = load_from_path(file.path()).unwrap_err();
    assert!(matches!(malformed, VfsError::TomlError(_)));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[config]\nmax_hierarchies = 0\n\n[input.a]\nroots = [\"a\"]\n").unwrap();
    let invalid = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(invalid, VfsError::ConfigError(_)));
}
