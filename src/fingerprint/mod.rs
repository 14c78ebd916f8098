// src/fingerprint/mod.rs

//! Fingerprints: normalized, comparable views over snapshots.
//!
//! A [`FingerprintingStrategy`] turns a set of root snapshots into a
//! [`FingerprintMap`] (absolute path to [`FileSystemLocationFingerprint`]).
//! The map, together with a whole-collection hash, forms a
//! [`CurrentFileCollectionFingerprint`], and two of those are diffed with a
//! [`CompareStrategy`].

pub mod compare;
pub mod strategy;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::hash::{ContentHash, DIR_SIGNATURE, Hasher, MISSING_FILE_SIGNATURE};
use crate::snapshot::{FileSystemLocationSnapshot, FileType};

pub use compare::{Change, ChangeKind, ChangeVisitor, CollectingChangeVisitor, CompareStrategy};
pub use strategy::{
    AbsolutePathFingerprintingStrategy, DirectorySensitivity, FingerprintingStrategy,
    IgnoredPathFingerprintingStrategy, NameOnlyFingerprintingStrategy,
    RelativePathFingerprintingStrategy, StrategyOptions, strategy_for,
};

/// One entry of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileSystemLocationFingerprint {
    pub normalized_path: String,
    pub file_type: FileType,
    pub normalized_content_hash: ContentHash,
}

impl FileSystemLocationFingerprint {
    /// Directories and missing entries get fixed marker hashes.
    pub fn new(normalized_path: impl Into<String>, file_type: FileType, content_hash: ContentHash) -> Self {
        let normalized_content_hash = match file_type {
            FileType::Directory => *DIR_SIGNATURE,
            FileType::Missing => *MISSING_FILE_SIGNATURE,
            FileType::RegularFile => content_hash,
        };
        Self {
            normalized_path: normalized_path.into(),
            file_type,
            normalized_content_hash,
        }
    }

    pub fn of(snapshot: &FileSystemLocationSnapshot, normalized_path: impl Into<String>) -> Self {
        Self::new(normalized_path, snapshot.file_type(), snapshot.content_hash())
    }

    pub fn append_to_hasher(&self, hasher: &mut Hasher) {
        hasher.put_string(&self.normalized_path);
        hasher.put_hash(&self.normalized_content_hash);
    }
}

impl fmt::Display for FileSystemLocationFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' / {}", self.normalized_path, self.normalized_content_hash)
    }
}

/// Whether entries are sorted before being folded into the collection hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintHashingStrategy {
    #[default]
    SortContents,
    KeepOrder,
}

/// Absolute path to fingerprint, in the order the entries were collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintMap {
    entries: Vec<(PathBuf, FileSystemLocationFingerprint)>,
    index: HashMap<PathBuf, usize>,
}

impl FingerprintMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless `path` is already present. Returns whether it was added.
    pub fn insert(&mut self, path: PathBuf, fingerprint: FileSystemLocationFingerprint) -> bool {
        if self.index.contains_key(&path) {
            return false;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, fingerprint));
        true
    }

    pub fn get(&self, path: &Path) -> Option<&FileSystemLocationFingerprint> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &FileSystemLocationFingerprint)> {
        self.entries.iter().map(|(p, f)| (p.as_path(), f))
    }

    /// Fingerprints by normalized path, for assertions and reports.
    pub fn by_normalized_path(&self) -> Vec<(&str, FileType, ContentHash)> {
        self.entries
            .iter()
            .map(|(_, f)| (f.normalized_path.as_str(), f.file_type, f.normalized_content_hash))
            .collect()
    }
}

impl FromIterator<(PathBuf, FileSystemLocationFingerprint)> for FingerprintMap {
    fn from_iter<I: IntoIterator<Item = (PathBuf, FileSystemLocationFingerprint)>>(iter: I) -> Self {
        let mut map = FingerprintMap::new();
        for (path, fingerprint) in iter {
            map.insert(path, fingerprint);
        }
        map
    }
}

/// Fingerprint of a file collection as of the current build.
///
/// Keeps the root snapshots it was computed from, so later consumers can
/// traverse them again.
#[derive(Debug, Clone)]
pub struct CurrentFileCollectionFingerprint {
    strategy_identifier: &'static str,
    compare_strategy: CompareStrategy,
    fingerprints: FingerprintMap,
    roots: Vec<FileSystemLocationSnapshot>,
    root_hashes: Vec<(PathBuf, ContentHash)>,
    hash: ContentHash,
}

impl CurrentFileCollectionFingerprint {
    pub fn new(roots: Vec<FileSystemLocationSnapshot>, strategy: &dyn FingerprintingStrategy) -> Self {
        let fingerprints = strategy.collect_fingerprints(&roots);
        let hash = collection_hash(&fingerprints, strategy.hashing_strategy());
        let root_hashes = roots
            .iter()
            .map(|r| (r.path().to_path_buf(), r.content_hash()))
            .collect();
        Self {
            strategy_identifier: strategy.identifier(),
            compare_strategy: strategy.compare_strategy(),
            fingerprints,
            roots,
            root_hashes,
            hash,
        }
    }

    pub fn fingerprints(&self) -> &FingerprintMap {
        &self.fingerprints
    }

    pub fn roots(&self) -> &[FileSystemLocationSnapshot] {
        &self.roots
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn strategy_identifier(&self) -> &'static str {
        self.strategy_identifier
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Report the changes from `previous` to `self`.
    ///
    /// Equal root hashes mean nothing changed, so the comparison is skipped.
    /// Returns `false` if the visitor stopped early.
    pub fn visit_changes_since(
        &self,
        previous: &CurrentFileCollectionFingerprint,
        property: &str,
        include_added: bool,
        visitor: &mut dyn ChangeVisitor,
    ) -> bool {
        if self.strategy_identifier == previous.strategy_identifier
            && self.root_hashes == previous.root_hashes
        {
            return true;
        }
        self.compare_strategy.visit_changes_since(
            &self.fingerprints,
            &previous.fingerprints,
            property,
            include_added,
            visitor,
        )
    }
}

/// Fold all fingerprints into one hash.
///
/// With [`FingerprintHashingStrategy::SortContents`] the result does not
/// depend on the order in which the roots were given.
pub fn collection_hash(fingerprints: &FingerprintMap, strategy: FingerprintHashingStrategy) -> ContentHash {
    let mut entries: Vec<&FileSystemLocationFingerprint> = fingerprints.iter().map(|(_, f)| f).collect();
    if strategy == FingerprintHashingStrategy::SortContents {
        entries.sort();
    }
    let mut hasher = Hasher::new();
    for entry in entries {
        entry.append_to_hasher(&mut hasher);
    }
    hasher.finish()
}
