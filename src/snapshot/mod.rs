// src/snapshot/mod.rs

//! Immutable snapshots of file system locations.
//!
//! A snapshot records the type and content hash of a path. Directory
//! snapshots own their children, sorted by name, and carry a Merkle hash of
//! them (see [`merkle`]). Snapshots are cheap to clone: every variant is an
//! `Arc` around the actual data, so subtrees are shared between snapshot
//! hierarchies instead of copied.

pub mod filter;
pub mod hierarchy;
pub mod merkle;
pub mod snapshotter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::hash::{ContentHash, MISSING_FILE_SIGNATURE};

pub use filter::{DefaultExcludes, SnapshottingFilter};
pub use hierarchy::{
    NoopDiffListener, RetainedStatistics, SnapshotCollectingDiffListener, SnapshotDiffListener,
    SnapshotHierarchy,
};
pub use merkle::MerkleDirectorySnapshotBuilder;
pub use snapshotter::{DirectorySnapshotter, SnapshotResult, WalkStatistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileType {
    RegularFile,
    Directory,
    Missing,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::RegularFile => "file",
            FileType::Directory => "directory",
            FileType::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// How a location was reached during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessType {
    #[default]
    Direct,
    ViaSymlink,
}

/// Metadata handed to the file hasher alongside the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub length: u64,
    /// Milliseconds since the unix epoch.
    pub last_modified: u64,
    pub access_type: AccessType,
}

#[derive(Debug)]
pub struct RegularFileSnapshot {
    pub path: PathBuf,
    pub name: String,
    pub content_hash: ContentHash,
    pub metadata: FileMetadata,
}

#[derive(Debug)]
pub struct DirectorySnapshot {
    pub path: PathBuf,
    pub name: String,
    pub access_type: AccessType,
    /// Sorted by name.
    pub children: Vec<FileSystemLocationSnapshot>,
    pub content_hash: ContentHash,
}

#[derive(Debug)]
pub struct MissingFileSnapshot {
    pub path: PathBuf,
    pub name: String,
    pub access_type: AccessType,
}

/// Snapshot of a single location: a regular file, a directory, or nothing.
#[derive(Debug, Clone)]
pub enum FileSystemLocationSnapshot {
    RegularFile(Arc<RegularFileSnapshot>),
    Directory(Arc<DirectorySnapshot>),
    Missing(Arc<MissingFileSnapshot>),
}

/// Last path segment, or the whole path for roots like `/`.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl FileSystemLocationSnapshot {
    pub fn regular_file(path: PathBuf, content_hash: ContentHash, metadata: FileMetadata) -> Self {
        let name = file_name_of(&path);
        Self::RegularFile(Arc::new(RegularFileSnapshot {
            path,
            name,
            content_hash,
            metadata,
        }))
    }

    /// Build a directory snapshot from children and an already computed hash.
    ///
    /// Children are sorted here; the hash must have been computed over the
    /// same sorted order (see [`MerkleDirectorySnapshotBuilder`]).
    pub fn directory(
        path: PathBuf,
        access_type: AccessType,
        mut children: Vec<FileSystemLocationSnapshot>,
        content_hash: ContentHash,
    ) -> Self {
        children.sort_by(|a, b| a.name().cmp(b.name()));
        let name = file_name_of(&path);
        Self::Directory(Arc::new(DirectorySnapshot {
            path,
            name,
            access_type,
            children,
            content_hash,
        }))
    }

    pub fn missing(path: PathBuf, access_type: AccessType) -> Self {
        let name = file_name_of(&path);
        Self::Missing(Arc::new(MissingFileSnapshot {
            path,
            name,
            access_type,
        }))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::RegularFile(f) => &f.path,
            Self::Directory(d) => &d.path,
            Self::Missing(m) => &m.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::RegularFile(f) => &f.name,
            Self::Directory(d) => &d.name,
            Self::Missing(m) => &m.name,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::RegularFile(_) => FileType::RegularFile,
            Self::Directory(_) => FileType::Directory,
            Self::Missing(_) => FileType::Missing,
        }
    }

    pub fn content_hash(&self) -> ContentHash {
        match self {
            Self::RegularFile(f) => f.content_hash,
            Self::Directory(d) => d.content_hash,
            Self::Missing(_) => *MISSING_FILE_SIGNATURE,
        }
    }

    pub fn access_type(&self) -> AccessType {
        match self {
            Self::RegularFile(f) => f.metadata.access_type,
            Self::Directory(d) => d.access_type,
            Self::Missing(m) => m.access_type,
        }
    }

    pub fn children(&self) -> &[FileSystemLocationSnapshot] {
        match self {
            Self::Directory(d) => &d.children,
            _ => &[],
        }
    }

    pub fn is_content_and_metadata_up_to_date(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::RegularFile(a), Self::RegularFile(b)) => {
                a.content_hash == b.content_hash && a.metadata == b.metadata
            }
            _ => self.file_type() == other.file_type() && self.content_hash() == other.content_hash(),
        }
    }

    /// True if both values point at the same shared snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::RegularFile(a), Self::RegularFile(b)) => Arc::ptr_eq(a, b),
            (Self::Directory(a), Self::Directory(b)) => Arc::ptr_eq(a, b),
            (Self::Missing(a), Self::Missing(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Look up the snapshot for `path`, which must be at or below this one.
    ///
    /// A path below a directory that has no such child is reported as missing,
    /// since directory snapshots are complete. A path below a file or missing
    /// location is missing as well.
    pub fn find(&self, path: &Path) -> Option<FileSystemLocationSnapshot> {
        let relative = path.strip_prefix(self.path()).ok()?;
        let mut current = self.clone();
        for segment in relative.components() {
            let segment = segment.as_os_str().to_string_lossy();
            let next = match &current {
                Self::Directory(d) => d
                    .children
                    .binary_search_by(|c| c.name().cmp(&*segment))
                    .ok()
                    .map(|idx| d.children[idx].clone()),
                _ => None,
            };
            match next {
                Some(child) => current = child,
                None => {
                    return Some(Self::missing(path.to_path_buf(), AccessType::Direct));
                }
            }
        }
        Some(current)
    }

    /// Depth-first, pre-order traversal. `relative` holds the names of the
    /// entries between this snapshot (exclusive) and the visited one (inclusive).
    pub fn accept(&self, visitor: &mut dyn SnapshotVisitor) -> SnapshotVisitResult {
        let mut relative = Vec::new();
        self.accept_inner(visitor, &mut relative, true)
    }

    fn accept_inner(
        &self,
        visitor: &mut dyn SnapshotVisitor,
        relative: &mut Vec<String>,
        is_root: bool,
    ) -> SnapshotVisitResult {
        if !is_root {
            relative.push(self.name().to_string());
        }
        let mut result = visitor.visit(self, relative);
        if result == SnapshotVisitResult::Continue {
            for child in self.children() {
                if child.accept_inner(visitor, relative, false) == SnapshotVisitResult::Terminate {
                    result = SnapshotVisitResult::Terminate;
                    break;
                }
            }
            if result != SnapshotVisitResult::Terminate {
                if let Self::Directory(dir) = self {
                    visitor.leave_directory(dir, relative);
                }
            }
        }
        if !is_root {
            relative.pop();
        }
        match result {
            SnapshotVisitResult::Terminate => SnapshotVisitResult::Terminate,
            _ => SnapshotVisitResult::Continue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotVisitResult {
    Continue,
    SkipSubtree,
    Terminate,
}

pub trait SnapshotVisitor {
    fn visit(&mut self, snapshot: &FileSystemLocationSnapshot, relative: &[String])
    -> SnapshotVisitResult;

    fn leave_directory(&mut self, _directory: &DirectorySnapshot, _relative: &[String]) {}
}

impl<F> SnapshotVisitor for F
where
    F: FnMut(&FileSystemLocationSnapshot, &[String]) -> SnapshotVisitResult,
{
    fn visit(
        &mut self,
        snapshot: &FileSystemLocationSnapshot,
        relative: &[String],
    ) -> SnapshotVisitResult {
        self(snapshot, relative)
    }
}

impl fmt::Display for FileSystemLocationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.file_type(), self.path().display())
    }
}
