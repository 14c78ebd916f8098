#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use vfswatch::config::{ConfigFile, ConfigSection, DefaultSection, InputConfig, RawConfigFile};
use vfswatch::hash::ContentHash;
use vfswatch::snapshot::merkle::directory_hash;
use vfswatch::snapshot::{AccessType, FileMetadata, FileSystemLocationSnapshot};
use vfswatch::types::{NormalizerKind, WatchMode};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
    base_dir: Option<PathBuf>,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                input: BTreeMap::new(),
            },
            base_dir: None,
        }
    }

    pub fn with_input(mut self, name: &str, input: InputConfig) -> Self {
        self.config.input.insert(name.to_string(), input);
        self
    }

    pub fn with_default_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_watch_mode(mut self, mode: WatchMode) -> Self {
        self.config.config.watch_mode = mode;
        self
    }

    pub fn with_max_hierarchies(mut self, max: usize) -> Self {
        self.config.config.max_hierarchies = max;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// The raw config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        let config = ConfigFile::try_from(self.config).expect("Failed to build valid config from builder");
        match self.base_dir {
            Some(dir) => config.with_base_dir(dir),
            None => config,
        }
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `InputConfig`.
pub struct InputConfigBuilder {
    input: InputConfig,
}

impl InputConfigBuilder {
    pub fn new(root: &str) -> Self {
        Self {
            input: InputConfig {
                roots: vec![root.to_string()],
                normalizer: NormalizerKind::Relative,
                include: vec![],
                exclude: vec![],
                include_missing: false,
                ignore_directories: false,
                ordered: false,
            },
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.input.roots.push(root.to_string());
        self
    }

    pub fn normalizer(mut self, kind: NormalizerKind) -> Self {
        self.input.normalizer = kind;
        self
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.input.include.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.input.exclude.push(pattern.to_string());
        self
    }

    pub fn include_missing(mut self, val: bool) -> Self {
        self.input.include_missing = val;
        self
    }

    pub fn ignore_directories(mut self, val: bool) -> Self {
        self.input.ignore_directories = val;
        self
    }

    pub fn ordered(mut self, val: bool) -> Self {
        self.input.ordered = val;
        self
    }

    pub fn build(self) -> InputConfig {
        self.input
    }
}

/// A regular file snapshot whose hash is derived from `content`.
pub fn file_snapshot(path: impl AsRef<Path>, content: &str) -> FileSystemLocationSnapshot {
    FileSystemLocationSnapshot::regular_file(
        path.as_ref().to_path_buf(),
        ContentHash::of(content.as_bytes()),
        FileMetadata {
            length: content.len() as u64,
            last_modified: 1,
            access_type: AccessType::Direct,
        },
    )
}

/// A directory snapshot with a correctly computed Merkle hash.
pub fn dir_snapshot(path: impl AsRef<Path>, children: Vec<FileSystemLocationSnapshot>) -> FileSystemLocationSnapshot {
    let mut children = children;
    children.sort_by(|a, b| a.name().cmp(b.name()));
    let hash = directory_hash(&children);
    FileSystemLocationSnapshot::directory(path.as_ref().to_path_buf(), AccessType::Direct, children, hash)
}

pub fn missing_snapshot(path: impl AsRef<Path>) -> FileSystemLocationSnapshot {
    FileSystemLocationSnapshot::missing(path.as_ref().to_path_buf(), AccessType::Direct)
}
