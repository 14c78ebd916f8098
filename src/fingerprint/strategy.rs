// src/fingerprint/strategy.rs

use std::collections::HashSet;
use std::fmt::Debug;
use std::path::PathBuf;

use crate::fingerprint::{
    CompareStrategy, FileSystemLocationFingerprint, FingerprintHashingStrategy, FingerprintMap,
};
use crate::snapshot::{FileSystemLocationSnapshot, FileType, SnapshotVisitResult};
use crate::types::NormalizerKind;

/// Whether directory entries take part in a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectorySensitivity {
    #[default]
    Default,
    /// Only files (and missing entries) count; empty directories are invisible.
    IgnoreDirectories,
}

/// Turns root snapshots into a fingerprint map.
pub trait FingerprintingStrategy: Send + Sync + Debug {
    fn identifier(&self) -> &'static str;

    /// Normalized path of a root snapshot.
    fn normalize_path(&self, root: &FileSystemLocationSnapshot) -> String;

    /// One entry per distinct absolute path, even when roots overlap.
    fn collect_fingerprints(&self, roots: &[FileSystemLocationSnapshot]) -> FingerprintMap;

    fn hashing_strategy(&self) -> FingerprintHashingStrategy;

    fn compare_strategy(&self) -> CompareStrategy;
}

/// Common knobs of the built-in strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyOptions {
    pub directory_sensitivity: DirectorySensitivity,
    pub hashing: FingerprintHashingStrategy,
    pub include_missing: bool,
}

/// Build the strategy for a normalizer.
pub fn strategy_for(kind: NormalizerKind, options: StrategyOptions) -> Box<dyn FingerprintingStrategy> {
    match kind {
        NormalizerKind::Absolute => Box::new(AbsolutePathFingerprintingStrategy { options }),
        NormalizerKind::Relative => Box::new(RelativePathFingerprintingStrategy { options }),
        NormalizerKind::NameOnly => Box::new(NameOnlyFingerprintingStrategy { options }),
        NormalizerKind::Ignored => Box::new(IgnoredPathFingerprintingStrategy { options }),
    }
}

/// Walk every root, feeding each snapshot not seen before to `normalize`.
///
/// `normalize` gets the snapshot, the names below its root and whether it is
/// the root itself, and returns the normalized path, or `None` to skip it.
fn collect_with<F>(
    roots: &[FileSystemLocationSnapshot],
    options: &StrategyOptions,
    mut normalize: F,
) -> FingerprintMap
where
    F: FnMut(&FileSystemLocationSnapshot, &[String]) -> Option<String>,
{
    let mut map = FingerprintMap::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();

    for root in roots {
        if root.file_type() == FileType::Missing && !options.include_missing {
            continue;
        }
        let mut visit = |snapshot: &FileSystemLocationSnapshot, relative: &[String]| {
            if !visited.insert(snapshot.path().to_path_buf()) {
                // Shared subtree already fingerprinted through another root.
                return SnapshotVisitResult::SkipSubtree;
            }
            let skip = match snapshot.file_type() {
                FileType::Directory => options.directory_sensitivity == DirectorySensitivity::IgnoreDirectories,
                FileType::Missing => !options.include_missing && !relative.is_empty(),
                FileType::RegularFile => false,
            };
            if !skip {
                if let Some(normalized) = normalize(snapshot, relative) {
                    map.insert(
                        snapshot.path().to_path_buf(),
                        FileSystemLocationFingerprint::of(snapshot, normalized),
                    );
                }
            }
            SnapshotVisitResult::Continue
        };
        root.accept(&mut visit);
    }
    map
}

/// Keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct AbsolutePathFingerprintingStrategy {
    pub options: StrategyOptions,
}

impl FingerprintingStrategy for AbsolutePathFingerprintingStrategy {
    fn identifier(&self) -> &'static str {
        "ABSOLUTE_PATH"
    }

    fn normalize_path(&self, root: &FileSystemLocationSnapshot) -> String {
        root.path().to_string_lossy().into_owned()
    }

    fn collect_fingerprints(&self, roots: &[FileSystemLocationSnapshot]) -> FingerprintMap {
        collect_with(roots, &self.options, |snapshot, _| {
            Some(snapshot.path().to_string_lossy().into_owned())
        })
    }

    fn hashing_strategy(&self) -> FingerprintHashingStrategy {
        self.options.hashing
    }

    fn compare_strategy(&self) -> CompareStrategy {
        CompareStrategy::AbsolutePath
    }
}

/// Keyed by the path relative to the root; a root file gets its own name.
///
/// A root directory is still an entry, keyed by the empty path, so an empty
/// directory root and an absent input fingerprint differently.
#[derive(Debug, Clone, Default)]
pub struct RelativePathFingerprintingStrategy {
    pub options: StrategyOptions,
}

impl FingerprintingStrategy for RelativePathFingerprintingStrategy {
    fn identifier(&self) -> &'static str {
        "RELATIVE_PATH"
    }

    fn normalize_path(&self, root: &FileSystemLocationSnapshot) -> String {
        match root.file_type() {
            FileType::Directory => String::new(),
            _ => root.name().to_string(),
        }
    }

    fn collect_fingerprints(&self, roots: &[FileSystemLocationSnapshot]) -> FingerprintMap {
        collect_with(roots, &self.options, |snapshot, relative| {
            if relative.is_empty() {
                Some(self.normalize_path(snapshot))
            } else {
                Some(relative.join("/"))
            }
        })
    }

    fn hashing_strategy(&self) -> FingerprintHashingStrategy {
        self.options.hashing
    }

    fn compare_strategy(&self) -> CompareStrategy {
        CompareStrategy::NormalizedPath
    }
}

/// Keyed by file name; a root directory collapses to the empty marker.
#[derive(Debug, Clone, Default)]
pub struct NameOnlyFingerprintingStrategy {
    pub options: StrategyOptions,
}

impl FingerprintingStrategy for NameOnlyFingerprintingStrategy {
    fn identifier(&self) -> &'static str {
        "NAME_ONLY"
    }

    fn normalize_path(&self, root: &FileSystemLocationSnapshot) -> String {
        match root.file_type() {
            FileType::Directory => String::new(),
            _ => root.name().to_string(),
        }
    }

    fn collect_fingerprints(&self, roots: &[FileSystemLocationSnapshot]) -> FingerprintMap {
        collect_with(roots, &self.options, |snapshot, relative| {
            if relative.is_empty() {
                Some(self.normalize_path(snapshot))
            } else {
                Some(snapshot.name().to_string())
            }
        })
    }

    fn hashing_strategy(&self) -> FingerprintHashingStrategy {
        self.options.hashing
    }

    fn compare_strategy(&self) -> CompareStrategy {
        CompareStrategy::NormalizedPath
    }
}

/// Only regular file contents matter; every entry is keyed by `""`.
#[derive(Debug, Clone, Default)]
pub struct IgnoredPathFingerprintingStrategy {
    pub options: StrategyOptions,
}

impl FingerprintingStrategy for IgnoredPathFingerprintingStrategy {
    fn identifier(&self) -> &'static str {
        "IGNORED_PATH"
    }

    fn normalize_path(&self, _root: &FileSystemLocationSnapshot) -> String {
        String::new()
    }

    fn collect_fingerprints(&self, roots: &[FileSystemLocationSnapshot]) -> FingerprintMap {
        collect_with(roots, &self.options, |snapshot, _| {
            (snapshot.file_type() == FileType::RegularFile).then(String::new)
        })
    }

    fn hashing_strategy(&self) -> FingerprintHashingStrategy {
        self.options.hashing
    }

    fn compare_strategy(&self) -> CompareStrategy {
        CompareStrategy::IgnoredPath
    }
}
