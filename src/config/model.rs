// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{NormalizerKind, VfsLogging, WatchMode, WatchStrategySetting};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// watch_mode = "default"
/// max_hierarchies = 50
///
/// [default]
/// exclude = ["**/.git/**"]
///
/// [input.sources]
/// roots = ["src"]
/// normalizer = "relative"
/// include = ["**/*.java"]
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one `[input.<name>]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// Keys are the input names (e.g. `"sources"`, `"resources"`).
    #[serde(default)]
    pub input: BTreeMap<String, InputConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means the
/// invariants checked in [`validate`](crate::config::validate) hold.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub input: BTreeMap<String, InputConfig>,
    /// Directory relative roots are resolved against; the directory holding
    /// the config file when loaded from disk.
    pub base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        input: BTreeMap<String, InputConfig>,
    ) -> Self {
        Self {
            config,
            default,
            input,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Absolute roots of one input.
    pub fn input_roots(&self, input: &InputConfig) -> Vec<PathBuf> {
        input.roots.iter().map(|root| self.resolve(root)).collect()
    }

    /// The hierarchies to register every build: the base directory plus any
    /// extra ones from `[config].hierarchies`.
    pub fn watchable_hierarchies(&self) -> Vec<PathBuf> {
        let mut hierarchies = vec![self.base_dir.clone()];
        hierarchies.extend(self.config.hierarchies.iter().map(|h| self.resolve(h)));
        hierarchies
    }

    pub fn immutable_locations(&self) -> Vec<PathBuf> {
        self.config
            .immutable_locations
            .iter()
            .map(|l| self.resolve(l))
            .collect()
    }

    /// Default excludes, always including the probe directory.
    pub fn default_excludes(&self) -> Vec<String> {
        let mut excludes = self.default.exclude.clone();
        let probe = format!("**/{}/**", self.config.probe_dir);
        if !excludes.contains(&probe) {
            excludes.push(probe);
        }
        excludes
    }
}

/// `[config]` section: how watching behaves.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    #[serde(default)]
    pub watch_mode: WatchMode,

    /// `"auto"` picks per platform: recursive watches on macOS and Windows,
    /// one watch per directory elsewhere.
    #[serde(default)]
    pub watch_strategy: WatchStrategySetting,

    #[serde(default)]
    pub vfs_logging: VfsLogging,

    /// How many watchable hierarchies are kept across builds; the least
    /// recently used ones beyond that are dropped.
    #[serde(default = "default_max_hierarchies")]
    pub max_hierarchies: usize,

    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Capacity of the queue between the native watcher and the VFS.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_probe_dir")]
    pub probe_dir: String,

    #[serde(default)]
    pub hierarchies: Vec<String>,

    /// Locations that never change while watching (toolchains, caches).
    #[serde(default)]
    pub immutable_locations: Vec<String>,
}

fn default_max_hierarchies() -> usize {
    50
}

fn default_quiet_period_ms() -> u64 {
    1_000
}

fn default_max_wait_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    4_096
}

fn default_probe_dir() -> String {
    ".vfswatch".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            watch_mode: WatchMode::default(),
            watch_strategy: WatchStrategySetting::default(),
            vfs_logging: VfsLogging::default(),
            max_hierarchies: default_max_hierarchies(),
            quiet_period_ms: default_quiet_period_ms(),
            max_wait_ms: default_max_wait_ms(),
            queue_capacity: default_queue_capacity(),
            probe_dir: default_probe_dir(),
            hierarchies: Vec::new(),
            immutable_locations: Vec::new(),
        }
    }
}

impl ConfigSection {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSection {
    /// Names never snapshotted, whatever the input filters say.
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

fn default_excludes() -> Vec<String> {
    vec!["**/.git/**".to_string(), "**/.vfswatch/**".to_string()]
}

impl Default for DefaultSection {
    fn default() -> Self {
        Self {
            exclude: default_excludes(),
        }
    }
}

/// `[input.<name>]` section: one fingerprinted file collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Files or directories, relative to the config file's directory.
    pub roots: Vec<String>,

    #[serde(default)]
    pub normalizer: NormalizerKind,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Whether missing roots take part in the fingerprint.
    #[serde(default)]
    pub include_missing: bool,

    /// Leave directories out of the fingerprint; only files count.
    #[serde(default)]
    pub ignore_directories: bool,

    /// The order of roots matters (classpath-like inputs).
    #[serde(default)]
    pub ordered: bool,
}
