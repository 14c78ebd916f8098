// src/watch/hierarchies.rs

//! The set of directories we are allowed to watch.
//!
//! A snapshot may only outlive a build if it lies inside a registered
//! hierarchy that is actually being watched, or inside an immutable location
//! that nobody changes behind our back.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{Result, VfsError};
use crate::snapshot::SnapshotHierarchy;
use crate::watch::probe::ProbeRegistry;

#[derive(Debug)]
pub struct WatchableHierarchies {
    probes: Arc<ProbeRegistry>,
    immutable_locations: Vec<PathBuf>,
    /// Most recently registered first.
    hierarchies: VecDeque<PathBuf>,
    unsupported_file_systems: Vec<PathBuf>,
}

impl WatchableHierarchies {
    pub fn new(probes: Arc<ProbeRegistry>, immutable_locations: Vec<PathBuf>) -> Self {
        Self {
            probes,
            immutable_locations,
            hierarchies: VecDeque::new(),
            unsupported_file_systems: Vec::new(),
        }
    }

    /// Register `hierarchy`, or mark it as most recently used if it already is.
    ///
    /// Fails if `hierarchy` is immutable, or if `root` already holds
    /// snapshots below it that nothing has been watching.
    pub fn register_watchable_hierarchy(&mut self, hierarchy: &Path, root: &SnapshotHierarchy) -> Result<()> {
        if self.is_immutable(hierarchy) {
            return Err(VfsError::UnwatchableHierarchy(hierarchy.display().to_string()));
        }
        if let Some(pos) = self.hierarchies.iter().position(|h| h == hierarchy) {
            if let Some(existing) = self.hierarchies.remove(pos) {
                self.hierarchies.push_front(existing);
            }
            return Ok(());
        }

        for snapshot in root.root_snapshots_under(hierarchy) {
            let path = snapshot.path();
            if !self.is_in_registered_hierarchy(path) && !self.is_immutable(path) {
                return Err(VfsError::StaleSnapshot {
                    snapshot: path.to_path_buf(),
                    hierarchy: hierarchy.to_path_buf(),
                });
            }
        }

        if self.is_in_unsupported_file_system(hierarchy) {
            info!(hierarchy = %hierarchy.display(), "hierarchy is on an unsupported file system, not watching it for now");
        }
        debug!(hierarchy = %hierarchy.display(), "registered watchable hierarchy");
        self.hierarchies.push_front(hierarchy.to_path_buf());
        self.probes.register_probe(hierarchy);
        Ok(())
    }

    pub fn unregister(&mut self, hierarchy: &Path) {
        self.hierarchies.retain(|h| h != hierarchy);
        self.probes.unregister_probe(hierarchy);
    }

    /// Registered hierarchies, most recently used first.
    pub fn hierarchies(&self) -> impl Iterator<Item = &PathBuf> {
        self.hierarchies.iter()
    }

    pub fn len(&self) -> usize {
        self.hierarchies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hierarchies.is_empty()
    }

    pub fn update_unsupported_file_systems(&mut self, mount_points: Vec<PathBuf>) {
        self.unsupported_file_systems = mount_points;
    }

    pub fn is_immutable(&self, path: &Path) -> bool {
        self.immutable_locations.iter().any(|l| path.starts_with(l))
    }

    pub fn is_in_registered_hierarchy(&self, path: &Path) -> bool {
        self.hierarchies.iter().any(|h| path.starts_with(h))
    }

    pub fn is_in_unsupported_file_system(&self, path: &Path) -> bool {
        self.unsupported_file_systems.iter().any(|m| path.starts_with(m))
    }

    /// Inside a registered hierarchy that can be watched.
    pub fn is_watchable(&self, path: &Path) -> bool {
        self.is_in_registered_hierarchy(path)
            && !self.is_in_unsupported_file_system(path)
            && !self.is_immutable(path)
    }

    /// Registered hierarchies with retained content on a supported file
    /// system, most recently used first. Nested hierarchies are included.
    pub fn watched_hierarchies(&self, root: &SnapshotHierarchy) -> Vec<PathBuf> {
        self.hierarchies
            .iter()
            .filter(|h| !self.is_in_unsupported_file_system(h) && root.has_descendants_under(h))
            .cloned()
            .collect()
    }

    /// Unregister hierarchies whose probe never fired and return them.
    pub fn remove_unproven_hierarchies(&mut self) -> Vec<PathBuf> {
        let unproven = self.probes.unproven_hierarchies();
        for hierarchy in &unproven {
            info!(hierarchy = %hierarchy.display(), "watch probe was not triggered, dropping state for hierarchy");
            self.unregister(hierarchy);
        }
        unproven
    }

    /// Drop hierarchies that have no content left, then evict the least
    /// recently used ones beyond `max_hierarchies`.
    ///
    /// Hierarchies on unsupported file systems stay registered so they can
    /// be watched again once their file system is.
    pub fn prune(&mut self, root: &SnapshotHierarchy, max_hierarchies: usize) -> Vec<PathBuf> {
        let empty: Vec<PathBuf> = self
            .hierarchies
            .iter()
            .filter(|h| !self.is_in_unsupported_file_system(h) && !root.has_descendants_under(h))
            .cloned()
            .collect();
        for hierarchy in &empty {
            self.unregister(hierarchy);
        }

        let mut evicted = Vec::new();
        while self.hierarchies.len() > max_hierarchies {
            let Some(hierarchy) = self.hierarchies.pop_back() else {
                break;
            };
            info!(hierarchy = %hierarchy.display(), max_hierarchies, "evicting least recently used hierarchy");
            self.probes.unregister_probe(&hierarchy);
            evicted.push(hierarchy);
        }
        evicted
    }

    /// Root snapshots that nothing watches and that may therefore go stale.
    pub fn unwatched_snapshot_roots(&self, root: &SnapshotHierarchy) -> Vec<PathBuf> {
        root.root_snapshots()
            .into_iter()
            .map(|s| s.path().to_path_buf())
            .filter(|path| !self.is_immutable(path) && !self.is_watchable(path))
            .collect()
    }

    /// Root snapshots on file systems we just learned are unsupported.
    pub fn unsupported_snapshot_roots(&self, root: &SnapshotHierarchy) -> Vec<PathBuf> {
        root.root_snapshots()
            .into_iter()
            .map(|s| s.path().to_path_buf())
            .filter(|path| self.is_in_unsupported_file_system(path))
            .collect()
    }
}
