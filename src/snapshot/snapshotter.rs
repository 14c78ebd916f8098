// src/snapshot/snapshotter.rs

//! Walks a directory tree once and builds its snapshot.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::errors::{Result, VfsError};
use crate::fs::{EntryKind, FileStat, FileSystem};
use crate::hash::FileHasher;
use crate::snapshot::filter::{DefaultExcludes, SnapshottingFilter};
use crate::snapshot::merkle::MerkleDirectorySnapshotBuilder;
use crate::snapshot::{AccessType, FileMetadata, FileSystemLocationSnapshot, file_name_of};

/// Outcome of a single walk.
#[derive(Debug, Clone)]
pub struct SnapshotResult {
    pub snapshot: FileSystemLocationSnapshot,
    /// The caller's filter removed something, so `snapshot` is not the full
    /// content of the location and must not be stored as such.
    pub filtered: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStatistics {
    pub walks: u64,
    pub files: u64,
    pub directories: u64,
    pub missing: u64,
    pub elapsed: Duration,
}

impl AddAssign for WalkStatistics {
    fn add_assign(&mut self, other: Self) {
        self.walks += other.walks;
        self.files += other.files;
        self.directories += other.directories;
        self.missing += other.missing;
        self.elapsed += other.elapsed;
    }
}

/// Builds snapshots of arbitrary locations.
///
/// Symlinks are followed. Entries reached through a link keep the link's
/// path and are marked [`AccessType::ViaSymlink`]; a dangling link becomes a
/// missing snapshot; a link back to a directory that is currently being
/// walked is a loop and is left out.
#[derive(Debug)]
pub struct DirectorySnapshotter {
    fs: Arc<dyn FileSystem>,
    hasher: Arc<dyn FileHasher>,
    default_excludes: DefaultExcludes,
    statistics: Mutex<WalkStatistics>,
}

impl DirectorySnapshotter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        hasher: Arc<dyn FileHasher>,
        default_excludes: DefaultExcludes,
    ) -> Self {
        Self {
            fs,
            hasher,
            default_excludes,
            statistics: Mutex::new(WalkStatistics::default()),
        }
    }

    pub fn hasher(&self) -> &Arc<dyn FileHasher> {
        &self.hasher
    }

    /// Snapshot `root`, applying `filter` during the walk.
    pub fn snapshot(&self, root: &Path, filter: &SnapshottingFilter) -> Result<SnapshotResult> {
        let started = Instant::now();
        let mut walk = Walk {
            fs: self.fs.as_ref(),
            hasher: self.hasher.as_ref(),
            default_excludes: &self.default_excludes,
            filter,
            builder: MerkleDirectorySnapshotBuilder::new(),
            parents: Vec::new(),
            relative: Vec::new(),
            stats: WalkStatistics {
                walks: 1,
                ..WalkStatistics::default()
            },
        };

        let stat = self
            .fs
            .stat(root)
            .map_err(|e| VfsError::walk_failed(root, e))?;
        let snapshot = match stat.kind {
            EntryKind::Missing => {
                walk.stats.missing += 1;
                FileSystemLocationSnapshot::missing(root.to_path_buf(), AccessType::Direct)
            }
            EntryKind::File => walk.file_snapshot(root, stat, AccessType::Direct)?,
            EntryKind::Directory => {
                let real = self
                    .fs
                    .canonicalize(root)
                    .unwrap_or_else(|_| root.to_path_buf());
                walk.visit_directory(root, real, AccessType::Direct)?;
                walk.finish(root)?
            }
            EntryKind::Symlink => {
                let target = walk.follow(root);
                match target.kind {
                    EntryKind::Missing => {
                        walk.stats.missing += 1;
                        FileSystemLocationSnapshot::missing(root.to_path_buf(), AccessType::ViaSymlink)
                    }
                    EntryKind::Directory => {
                        let real = self
                            .fs
                            .canonicalize(root)
                            .map_err(|e| VfsError::walk_failed(root, e))?;
                        walk.visit_directory(root, real, AccessType::ViaSymlink)?;
                        walk.finish(root)?
                    }
                    _ => walk.file_snapshot(root, target, AccessType::ViaSymlink)?,
                }
            }
            EntryKind::Other => return Err(not_a_regular_file(root)),
        };

        let filtered = walk.builder.is_filtered();
        walk.stats.elapsed = started.elapsed();
        debug!(
            root = %root.display(),
            files = walk.stats.files,
            directories = walk.stats.directories,
            missing = walk.stats.missing,
            filtered,
            elapsed_ms = walk.stats.elapsed.as_millis() as u64,
            "snapshotted location"
        );
        *self.statistics.lock().unwrap_or_else(|p| p.into_inner()) += walk.stats;

        Ok(SnapshotResult { snapshot, filtered })
    }

    /// Totals since the last call.
    pub fn take_statistics(&self) -> WalkStatistics {
        std::mem::take(&mut *self.statistics.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

fn not_a_regular_file(path: &Path) -> VfsError {
    VfsError::walk_failed(
        path,
        anyhow::anyhow!("Cannot snapshot {}: not a regular file", path.display()),
    )
}

struct Walk<'a> {
    fs: &'a dyn FileSystem,
    hasher: &'a dyn FileHasher,
    default_excludes: &'a DefaultExcludes,
    filter: &'a SnapshottingFilter,
    builder: MerkleDirectorySnapshotBuilder,
    /// Real paths of the directories currently being walked.
    parents: Vec<PathBuf>,
    /// Names from the walk root to the current entry.
    relative: Vec<String>,
    stats: WalkStatistics,
}

impl Walk<'_> {
    fn finish(&mut self, root: &Path) -> Result<FileSystemLocationSnapshot> {
        self.builder.take_result().ok_or_else(|| {
            VfsError::walk_failed(root, anyhow::anyhow!("walk ended inside a directory"))
        })
    }

    fn follow(&self, link: &Path) -> FileStat {
        self.fs.stat_following(link).unwrap_or_else(|err| {
            debug!(path = %link.display(), "cannot resolve symlink target: {err:#}");
            FileStat::missing()
        })
    }

    fn visit_directory(&mut self, path: &Path, real: PathBuf, access_type: AccessType) -> Result<()> {
        self.stats.directories += 1;
        self.builder.enter_directory(path.to_path_buf(), access_type);
        self.parents.push(real.clone());

        let entries = self
            .fs
            .read_dir(path)
            .map_err(|e| VfsError::walk_failed(path, e))?;
        for entry in entries {
            let name = file_name_of(&entry);
            self.relative.push(name.clone());
            let visited = self.visit_entry(&entry, &name, &real);
            self.relative.pop();
            visited?;
        }

        self.parents.pop();
        self.builder.leave_directory();
        Ok(())
    }

    fn visit_entry(&mut self, entry: &Path, name: &str, parent_real: &Path) -> Result<()> {
        let stat = self
            .fs
            .stat(entry)
            .map_err(|e| VfsError::walk_failed(entry, e))?;
        match stat.kind {
            EntryKind::Directory => {
                if self.should_visit(name, true) {
                    self.visit_directory(entry, parent_real.join(name), AccessType::Direct)?;
                }
            }
            EntryKind::File => {
                if self.should_visit(name, false) {
                    let snapshot = self.file_snapshot(entry, stat, AccessType::Direct)?;
                    self.builder.visit_leaf(snapshot);
                }
            }
            EntryKind::Symlink => self.visit_symlink(entry, name)?,
            EntryKind::Missing => {
                debug!(path = %entry.display(), "entry vanished during walk");
            }
            EntryKind::Other => {
                if self.should_visit(name, false) {
                    return Err(not_a_regular_file(entry));
                }
            }
        }
        Ok(())
    }

    fn visit_symlink(&mut self, link: &Path, name: &str) -> Result<()> {
        let target = self.follow(link);
        match target.kind {
            EntryKind::Directory => {
                if !self.should_visit(name, true) {
                    return Ok(());
                }
                let real = self
                    .fs
                    .canonicalize(link)
                    .map_err(|e| VfsError::walk_failed(link, e))?;
                if self.parents.contains(&real) {
                    debug!(path = %link.display(), target = %real.display(), "skipping symlink loop");
                    return Ok(());
                }
                self.visit_directory(link, real, AccessType::ViaSymlink)
            }
            EntryKind::Missing => {
                if self.should_visit(name, false) {
                    self.stats.missing += 1;
                    self.builder.visit_leaf(FileSystemLocationSnapshot::missing(
                        link.to_path_buf(),
                        AccessType::ViaSymlink,
                    ));
                }
                Ok(())
            }
            EntryKind::File => {
                if self.should_visit(name, false) {
                    let snapshot = self.file_snapshot(link, target, AccessType::ViaSymlink)?;
                    self.builder.visit_leaf(snapshot);
                }
                Ok(())
            }
            EntryKind::Symlink | EntryKind::Other => {
                if self.should_visit(name, false) {
                    return Err(not_a_regular_file(link));
                }
                Ok(())
            }
        }
    }

    fn file_snapshot(
        &mut self,
        path: &Path,
        stat: FileStat,
        access_type: AccessType,
    ) -> Result<FileSystemLocationSnapshot> {
        if stat.kind != EntryKind::File {
            return Err(not_a_regular_file(path));
        }
        self.stats.files += 1;
        let metadata = FileMetadata {
            length: stat.length,
            last_modified: stat.last_modified,
            access_type,
        };
        let hash = self
            .hasher
            .hash(path, &metadata)
            .map_err(|e| VfsError::walk_failed(path, e))?;
        Ok(FileSystemLocationSnapshot::regular_file(
            path.to_path_buf(),
            hash,
            metadata,
        ))
    }

    /// Default excludes never mark the walk as filtered; the caller's filter does.
    fn should_visit(&mut self, name: &str, is_directory: bool) -> bool {
        let relative = self.relative.join("/");
        if self.default_excludes.excludes(name, &relative, is_directory) {
            return false;
        }
        if self.filter.is_empty() {
            return true;
        }
        let allowed = self.filter.accepts(&relative, is_directory);
        if !allowed {
            self.builder.mark_filtered();
        }
        allowed
    }
}
