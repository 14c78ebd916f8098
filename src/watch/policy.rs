// src/watch/policy.rs

//! Deciding which directories to hand to the native watcher.
//!
//! A [`WatchUpdatePolicy`] turns changes of the snapshot hierarchy and of the
//! registered hierarchies into a [`WatchSetChange`]; the registry queues it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::snapshot::{FileSystemLocationSnapshot, FileType, SnapshotHierarchy, SnapshotVisitResult};
use crate::watch::hierarchies::WatchableHierarchies;

/// Directories to start and stop watching, in that order of application:
/// stops first, then starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSetChange {
    pub start: Vec<PathBuf>,
    pub stop: Vec<PathBuf>,
}

impl WatchSetChange {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty()
    }
}

pub trait WatchUpdatePolicy: Send + Debug {
    /// The snapshot hierarchy changed from an update that removed and added
    /// the given root snapshots.
    fn contents_changed(
        &mut self,
        removed: &[FileSystemLocationSnapshot],
        added: &[FileSystemLocationSnapshot],
        root: &SnapshotHierarchy,
        hierarchies: &WatchableHierarchies,
    ) -> WatchSetChange;

    /// Registered hierarchies changed; recompute the watch set from scratch.
    fn hierarchies_changed(&mut self, root: &SnapshotHierarchy, hierarchies: &WatchableHierarchies) -> WatchSetChange;

    /// The directories holding probe files that must be watched.
    fn probe_directories_changed(&mut self, directories: &[PathBuf]) -> WatchSetChange;

    fn watched_directories(&self) -> Vec<PathBuf>;

    /// Whether a watch on a directory covers everything below it.
    fn is_recursive(&self) -> bool;
}

/// Watches the outermost watched hierarchies, one recursive watch each.
#[derive(Debug, Default)]
pub struct HierarchicalWatchPolicy {
    watched: BTreeSet<PathBuf>,
}

impl HierarchicalWatchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&mut self, root: &SnapshotHierarchy, hierarchies: &WatchableHierarchies) -> WatchSetChange {
        let candidates = hierarchies.watched_hierarchies(root);
        // An inner hierarchy is covered by the recursive watch of an outer one.
        let desired: BTreeSet<PathBuf> = candidates
            .iter()
            .filter(|h| !candidates.iter().any(|outer| outer != *h && h.starts_with(outer)))
            .cloned()
            .collect();
        let change = WatchSetChange {
            start: desired.difference(&self.watched).cloned().collect(),
            stop: self.watched.difference(&desired).cloned().collect(),
        };
        self.watched = desired;
        change
    }
}

impl WatchUpdatePolicy for HierarchicalWatchPolicy {
    fn contents_changed(
        &mut self,
        _removed: &[FileSystemLocationSnapshot],
        _added: &[FileSystemLocationSnapshot],
        root: &SnapshotHierarchy,
        hierarchies: &WatchableHierarchies,
    ) -> WatchSetChange {
        self.update(root, hierarchies)
    }

    fn hierarchies_changed(&mut self, root: &SnapshotHierarchy, hierarchies: &WatchableHierarchies) -> WatchSetChange {
        self.update(root, hierarchies)
    }

    fn probe_directories_changed(&mut self, _directories: &[PathBuf]) -> WatchSetChange {
        WatchSetChange::default()
    }

    fn watched_directories(&self) -> Vec<PathBuf> {
        self.watched.iter().cloned().collect()
    }

    fn is_recursive(&self) -> bool {
        true
    }
}

/// Watches every directory with live content, refcounted.
///
/// A root snapshot holds one reference on its containing directory and, if
/// it is a directory, one on itself and on each directory below it. A
/// directory is watched while it has references or holds a probe.
#[derive(Debug, Default)]
pub struct NonHierarchicalWatchPolicy {
    watch_counts: DashMap<PathBuf, usize>,
    probe_directories: HashSet<PathBuf>,
}

impl NonHierarchicalWatchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// References held on `path` by snapshots.
    pub fn watch_count(&self, path: &Path) -> usize {
        self.watch_counts.get(path).map(|count| *count).unwrap_or(0)
    }

    fn is_watched(&self, path: &Path) -> bool {
        self.watch_counts.contains_key(path) || self.probe_directories.contains(path)
    }

    fn touch(&self, path: &Path, touched: &mut HashMap<PathBuf, bool>) {
        if !touched.contains_key(path) {
            touched.insert(path.to_path_buf(), self.is_watched(path));
        }
    }

    fn increment(&self, path: PathBuf, touched: &mut HashMap<PathBuf, bool>) {
        self.touch(&path, touched);
        *self.watch_counts.entry(path).or_insert(0) += 1;
    }

    fn decrement(&self, path: PathBuf, touched: &mut HashMap<PathBuf, bool>) {
        self.touch(&path, touched);
        if let Some(mut count) = self.watch_counts.get_mut(&path) {
            *count = count.saturating_sub(1);
        }
        self.watch_counts.remove_if(&path, |_, count| *count == 0);
    }

    /// Compare the watched state of every touched directory before and after.
    fn finish(&self, touched: HashMap<PathBuf, bool>) -> WatchSetChange {
        let mut change = WatchSetChange::default();
        for (path, was_watched) in touched {
            match (was_watched, self.is_watched(&path)) {
                (false, true) => change.start.push(path),
                (true, false) => change.stop.push(path),
                _ => {}
            }
        }
        change.start.sort();
        change.stop.sort();
        change
    }
}

/// The directories a root snapshot keeps watched.
fn directories_to_watch(snapshot: &FileSystemLocationSnapshot, hierarchies: &WatchableHierarchies) -> Vec<PathBuf> {
    let mut directories = Vec::new();
    if let Some(parent) = snapshot.path().parent() {
        if hierarchies.is_watchable(parent) {
            directories.push(parent.to_path_buf());
        }
    }
    if snapshot.file_type() == FileType::Directory {
        let mut collect = |s: &FileSystemLocationSnapshot, _: &[String]| {
            if s.file_type() == FileType::Directory && hierarchies.is_watchable(s.path()) {
                directories.push(s.path().to_path_buf());
            }
            SnapshotVisitResult::Continue
        };
        snapshot.accept(&mut collect);
    }
    directories
}

impl WatchUpdatePolicy for NonHierarchicalWatchPolicy {
    fn contents_changed(
        &mut self,
        removed: &[FileSystemLocationSnapshot],
        added: &[FileSystemLocationSnapshot],
        _root: &SnapshotHierarchy,
        hierarchies: &WatchableHierarchies,
    ) -> WatchSetChange {
        let mut touched = HashMap::new();
        for snapshot in removed {
            for directory in directories_to_watch(snapshot, hierarchies) {
                self.decrement(directory, &mut touched);
            }
        }
        for snapshot in added {
            for directory in directories_to_watch(snapshot, hierarchies) {
                self.increment(directory, &mut touched);
            }
        }
        self.finish(touched)
    }

    fn hierarchies_changed(&mut self, root: &SnapshotHierarchy, hierarchies: &WatchableHierarchies) -> WatchSetChange {
        let mut touched = HashMap::new();
        let previous: Vec<PathBuf> = self.watch_counts.iter().map(|e| e.key().clone()).collect();
        for path in previous {
            self.touch(&path, &mut touched);
        }
        self.watch_counts.clear();
        for snapshot in root.root_snapshots() {
            for directory in directories_to_watch(&snapshot, hierarchies) {
                self.increment(directory, &mut touched);
            }
        }
        self.finish(touched)
    }

    fn probe_directories_changed(&mut self, directories: &[PathBuf]) -> WatchSetChange {
        let mut touched = HashMap::new();
        let desired: HashSet<PathBuf> = directories.iter().cloned().collect();
        for path in self.probe_directories.union(&desired) {
            self.touch(path, &mut touched);
        }
        self.probe_directories = desired;
        self.finish(touched)
    }

    fn watched_directories(&self) -> Vec<PathBuf> {
        let mut directories: BTreeSet<PathBuf> = self.watch_counts.iter().map(|e| e.key().clone()).collect();
        directories.extend(self.probe_directories.iter().cloned());
        directories.into_iter().collect()
    }

    fn is_recursive(&self) -> bool {
        false
    }
}
