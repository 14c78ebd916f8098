// src/snapshot/merkle.rs

//! Bottom-up directory hashing.

use std::path::PathBuf;

use crate::hash::{ContentHash, DIR_SIGNATURE, Hasher};
use crate::snapshot::{AccessType, FileSystemLocationSnapshot};

/// Hash of a directory with the given children.
///
/// The children are hashed in name order, whatever order they come in, so the
/// result does not depend on how the platform listed the directory.
pub fn directory_hash(children: &[FileSystemLocationSnapshot]) -> ContentHash {
    let mut sorted: Vec<&FileSystemLocationSnapshot> = children.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut hasher = Hasher::new();
    hasher.put_hash(&DIR_SIGNATURE);
    for child in sorted {
        hasher.put_string(child.name());
        hasher.put_hash(&child.content_hash());
    }
    hasher.finish()
}

#[derive(Debug)]
struct Level {
    path: PathBuf,
    access_type: AccessType,
    children: Vec<FileSystemLocationSnapshot>,
}

/// Assembles directory snapshots while a walk enters and leaves directories.
///
/// ```text
/// enter_directory(/a)
///   visit_leaf(/a/f)
///   enter_directory(/a/b)
///   leave_directory()      -> /a/b is added to /a
/// leave_directory()        -> /a becomes the result
/// ```
#[derive(Debug, Default)]
pub struct MerkleDirectorySnapshotBuilder {
    levels: Vec<Level>,
    result: Option<FileSystemLocationSnapshot>,
    filtered: bool,
}

impl MerkleDirectorySnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_directory(&mut self, path: PathBuf, access_type: AccessType) {
        self.levels.push(Level {
            path,
            access_type,
            children: Vec::new(),
        });
    }

    /// Record a file, missing entry or complete directory at the current level.
    pub fn visit_leaf(&mut self, snapshot: FileSystemLocationSnapshot) {
        self.collect(snapshot);
    }

    /// Something below the current level was left out by a filter.
    pub fn mark_filtered(&mut self) {
        self.filtered = true;
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Close the current directory, hash it and hand it to its parent.
    ///
    /// Returns the finished directory snapshot.
    pub fn leave_directory(&mut self) -> Option<FileSystemLocationSnapshot> {
        let level = self.levels.pop()?;
        let hash = directory_hash(&level.children);
        let snapshot =
            FileSystemLocationSnapshot::directory(level.path, level.access_type, level.children, hash);
        self.collect(snapshot.clone());
        Some(snapshot)
    }

    /// The outermost snapshot, once every entered directory has been left.
    pub fn take_result(&mut self) -> Option<FileSystemLocationSnapshot> {
        if self.levels.is_empty() {
            self.result.take()
        } else {
            None
        }
    }

    fn collect(&mut self, snapshot: FileSystemLocationSnapshot) {
        match self.levels.last_mut() {
            Some(level) => level.children.push(snapshot),
            None => self.result = Some(snapshot),
        }
    }
}
