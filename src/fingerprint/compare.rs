// src/fingerprint/compare.rs

//! Diffing two fingerprint maps.
//!
//! Changes are reported in a fixed order: removed and modified entries in the
//! order of the previous map, then added entries in the order of the current
//! map. Visitors may stop the comparison early by returning `false`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::fingerprint::{FileSystemLocationFingerprint, FingerprintMap};
use crate::hash::ContentHash;
use crate::snapshot::FileType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub normalized_path: String,
    pub file_type: FileType,
    pub property: String,
}

impl Change {
    fn new(kind: ChangeKind, property: &str, path: &Path, fingerprint: &FileSystemLocationFingerprint) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            normalized_path: fingerprint.normalized_path.clone(),
            file_type: fingerprint.file_type,
            property: property.to_string(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} has been {}",
            self.property,
            self.file_type,
            self.path.display(),
            self.kind
        )
    }
}

/// Receives changes one by one. Returning `false` stops the comparison.
pub trait ChangeVisitor {
    fn visit_change(&mut self, change: Change) -> bool;
}

impl<F> ChangeVisitor for F
where
    F: FnMut(Change) -> bool,
{
    fn visit_change(&mut self, change: Change) -> bool {
        self(change)
    }
}

/// Collects changes, optionally stopping after `limit` of them.
#[derive(Debug, Default)]
pub struct CollectingChangeVisitor {
    pub changes: Vec<Change>,
    limit: Option<usize>,
}

impl CollectingChangeVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            changes: Vec::new(),
            limit: Some(limit),
        }
    }
}

impl ChangeVisitor for CollectingChangeVisitor {
    fn visit_change(&mut self, change: Change) -> bool {
        self.changes.push(change);
        self.limit.is_none_or(|limit| self.changes.len() < limit)
    }
}

/// How entries of two fingerprints are matched up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareStrategy {
    /// Match by absolute path.
    AbsolutePath,
    /// Match by normalized path; an entry that moved but kept its normalized
    /// path and content is unchanged.
    NormalizedPath,
    /// Match by content only; moving a file without changing it is no change.
    IgnoredPath,
}

struct Emitter<'a> {
    property: &'a str,
    visitor: &'a mut dyn ChangeVisitor,
}

impl Emitter<'_> {
    fn emit(&mut self, kind: ChangeKind, path: &Path, fingerprint: &FileSystemLocationFingerprint) -> bool {
        self.visitor
            .visit_change(Change::new(kind, self.property, path, fingerprint))
    }
}

impl CompareStrategy {
    /// Report the changes from `previous` to `current`.
    ///
    /// Returns `false` if the visitor stopped early.
    pub fn visit_changes_since(
        self,
        current: &FingerprintMap,
        previous: &FingerprintMap,
        property: &str,
        include_added: bool,
        visitor: &mut dyn ChangeVisitor,
    ) -> bool {
        let mut emitter = Emitter { property, visitor };
        match self.visit_trivial(current, previous, include_added, &mut emitter) {
            Some(result) => result,
            None => self.visit_general(current, previous, include_added, &mut emitter),
        }
    }

    /// The full matching algorithm, without the shortcuts for empty and
    /// single-entry fingerprints. Both always report the same changes.
    pub fn visit_changes_general(
        self,
        current: &FingerprintMap,
        previous: &FingerprintMap,
        property: &str,
        include_added: bool,
        visitor: &mut dyn ChangeVisitor,
    ) -> bool {
        let mut emitter = Emitter { property, visitor };
        self.visit_general(current, previous, include_added, &mut emitter)
    }

    fn visit_trivial(
        self,
        current: &FingerprintMap,
        previous: &FingerprintMap,
        include_added: bool,
        emitter: &mut Emitter<'_>,
    ) -> Option<bool> {
        if current.is_empty() {
            return Some(previous.iter().all(|(path, fp)| emitter.emit(ChangeKind::Removed, path, fp)));
        }
        if previous.is_empty() {
            if !include_added {
                return Some(true);
            }
            return Some(current.iter().all(|(path, fp)| emitter.emit(ChangeKind::Added, path, fp)));
        }
        if current.len() > 1 || previous.len() > 1 {
            return None;
        }

        let (current_path, current_fp) = current.iter().next()?;
        let (previous_path, previous_fp) = previous.iter().next()?;
        let (unchanged, same_location) = match self {
            CompareStrategy::AbsolutePath => {
                let same = current_path == previous_path;
                (same && current_fp == previous_fp, same)
            }
            CompareStrategy::NormalizedPath => (
                current_fp == previous_fp,
                current_fp.normalized_path == previous_fp.normalized_path,
            ),
            CompareStrategy::IgnoredPath => (
                current_fp.normalized_content_hash == previous_fp.normalized_content_hash,
                false,
            ),
        };
        if unchanged {
            return Some(true);
        }
        if same_location {
            return Some(emitter.emit(ChangeKind::Modified, current_path, current_fp));
        }
        Some(
            emitter.emit(ChangeKind::Removed, previous_path, previous_fp)
                && (!include_added || emitter.emit(ChangeKind::Added, current_path, current_fp)),
        )
    }

    fn visit_general(
        self,
        current: &FingerprintMap,
        previous: &FingerprintMap,
        include_added: bool,
        emitter: &mut Emitter<'_>,
    ) -> bool {
        match self {
            CompareStrategy::AbsolutePath => compare_absolute(current, previous, include_added, emitter),
            CompareStrategy::NormalizedPath => compare_normalized(current, previous, include_added, emitter),
            CompareStrategy::IgnoredPath => compare_ignored(current, previous, include_added, emitter),
        }
    }
}

fn compare_absolute(
    current: &FingerprintMap,
    previous: &FingerprintMap,
    include_added: bool,
    emitter: &mut Emitter<'_>,
) -> bool {
    for (path, previous_fp) in previous.iter() {
        let keep_going = match current.get(path) {
            Some(current_fp) if current_fp == previous_fp => true,
            Some(current_fp) => emitter.emit(ChangeKind::Modified, path, current_fp),
            None => emitter.emit(ChangeKind::Removed, path, previous_fp),
        };
        if !keep_going {
            return false;
        }
    }
    if include_added {
        for (path, current_fp) in current.iter() {
            if !previous.contains(path) && !emitter.emit(ChangeKind::Added, path, current_fp) {
                return false;
            }
        }
    }
    true
}

fn compare_normalized(
    current: &FingerprintMap,
    previous: &FingerprintMap,
    include_added: bool,
    emitter: &mut Emitter<'_>,
) -> bool {
    let current_entries: Vec<(&Path, &FileSystemLocationFingerprint)> = current.iter().collect();
    let mut matched = vec![false; current_entries.len()];

    let mut by_fingerprint: HashMap<&FileSystemLocationFingerprint, VecDeque<usize>> = HashMap::new();
    for (i, (_, fp)) in current_entries.iter().enumerate() {
        by_fingerprint.entry(*fp).or_default().push_back(i);
    }

    let mut unmatched_previous = Vec::new();
    for (path, previous_fp) in previous.iter() {
        match by_fingerprint.get_mut(previous_fp).and_then(VecDeque::pop_front) {
            Some(i) => matched[i] = true,
            None => unmatched_previous.push((path, previous_fp)),
        }
    }

    let mut by_normalized_path: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (i, (_, fp)) in current_entries.iter().enumerate() {
        if !matched[i] {
            by_normalized_path
                .entry(fp.normalized_path.as_str())
                .or_default()
                .push_back(i);
        }
    }

    for (path, previous_fp) in unmatched_previous {
        let modified = by_normalized_path
            .get_mut(previous_fp.normalized_path.as_str())
            .and_then(VecDeque::pop_front);
        let keep_going = match modified {
            Some(i) => {
                matched[i] = true;
                let (current_path, current_fp) = current_entries[i];
                emitter.emit(ChangeKind::Modified, current_path, current_fp)
            }
            None => emitter.emit(ChangeKind::Removed, path, previous_fp),
        };
        if !keep_going {
            return false;
        }
    }

    if include_added {
        for (i, (path, fp)) in current_entries.iter().enumerate() {
            if !matched[i] && !emitter.emit(ChangeKind::Added, path, fp) {
                return false;
            }
        }
    }
    true
}

fn compare_ignored(
    current: &FingerprintMap,
    previous: &FingerprintMap,
    include_added: bool,
    emitter: &mut Emitter<'_>,
) -> bool {
    let current_entries: Vec<(&Path, &FileSystemLocationFingerprint)> = current.iter().collect();
    let mut matched = vec![false; current_entries.len()];

    let mut by_hash: HashMap<ContentHash, VecDeque<usize>> = HashMap::new();
    for (i, (_, fp)) in current_entries.iter().enumerate() {
        by_hash.entry(fp.normalized_content_hash).or_default().push_back(i);
    }

    for (path, previous_fp) in previous.iter() {
        match by_hash
            .get_mut(&previous_fp.normalized_content_hash)
            .and_then(VecDeque::pop_front)
        {
            Some(i) => matched[i] = true,
            None => {
                if !emitter.emit(ChangeKind::Removed, path, previous_fp) {
                    return false;
                }
            }
        }
    }

    if include_added {
        for (i, (path, fp)) in current_entries.iter().enumerate() {
            if !matched[i] && !emitter.emit(ChangeKind::Added, path, fp) {
                return false;
            }
        }
    }
    true
}
