// src/watch/registry.rs

//! The registry decides what one native watcher watches.
//!
//! It owns the registered hierarchies, the probes and the update policy. Every
//! [`WatchSetChange`] the policy produces is queued; the virtual file system
//! takes the queue and makes the native calls once it no longer holds its
//! state lock, since a native call can wait on the event consumer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, VfsError};
use crate::fs::FileSystem;
use crate::snapshot::{FileSystemLocationSnapshot, SnapshotHierarchy};
use crate::types::WatchMode;
use crate::watch::hierarchies::WatchableHierarchies;
use crate::watch::platform::{WatchStrategy, WatcherPlatform};
use crate::watch::policy::{
    HierarchicalWatchPolicy, NonHierarchicalWatchPolicy, WatchSetChange, WatchUpdatePolicy,
};
use crate::watch::probe::ProbeRegistry;

/// What the event stream saw since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchingStatistics {
    pub events_received: u64,
    /// The native layer reported an overflow.
    pub unknown_event_encountered: bool,
    pub error_while_receiving_file_changes: Option<String>,
}

impl WatchingStatistics {
    /// Retained state can no longer be trusted.
    pub fn has_dropped_state(&self) -> bool {
        self.unknown_event_encountered || self.error_while_receiving_file_changes.is_some()
    }
}

#[derive(Debug)]
pub struct FileWatcherRegistry {
    policy: Box<dyn WatchUpdatePolicy>,
    hierarchies: WatchableHierarchies,
    probes: Arc<ProbeRegistry>,
    platform: WatcherPlatform,
    fs: Arc<dyn FileSystem>,
    statistics: WatchingStatistics,
    /// Changes not yet applied to the native watcher, oldest first.
    pending: Vec<WatchSetChange>,
}

impl FileWatcherRegistry {
    pub fn new(
        strategy: WatchStrategy,
        platform: WatcherPlatform,
        probes: Arc<ProbeRegistry>,
        fs: Arc<dyn FileSystem>,
        immutable_locations: Vec<PathBuf>,
    ) -> Self {
        let policy: Box<dyn WatchUpdatePolicy> = match strategy {
            WatchStrategy::Hierarchical => Box::new(HierarchicalWatchPolicy::new()),
            WatchStrategy::NonHierarchical => Box::new(NonHierarchicalWatchPolicy::new()),
        };
        Self {
            policy,
            hierarchies: WatchableHierarchies::new(Arc::clone(&probes), immutable_locations),
            probes,
            platform,
            fs,
            statistics: WatchingStatistics::default(),
            pending: Vec::new(),
        }
    }

    pub fn register_watchable_hierarchy(&mut self, hierarchy: &Path, root: &SnapshotHierarchy) -> Result<()> {
        if self.platform.reports_canonical_paths() {
            match self.fs.canonicalize(hierarchy) {
                Ok(canonical) if canonical != hierarchy => {
                    return Err(VfsError::watching_not_supported(
                        hierarchy,
                        format!("its canonical path '{}' is different", canonical.display()),
                    ));
                }
                Ok(_) => {}
                Err(err) => debug!(hierarchy = %hierarchy.display(), "cannot canonicalize hierarchy: {err:#}"),
            }
        }
        self.hierarchies.register_watchable_hierarchy(hierarchy, root)?;
        self.refresh_watches(root);
        Ok(())
    }

    pub fn virtual_file_system_contents_changed(
        &mut self,
        removed: &[FileSystemLocationSnapshot],
        added: &[FileSystemLocationSnapshot],
        root: &SnapshotHierarchy,
    ) {
        let change = self.policy.contents_changed(removed, added, root, &self.hierarchies);
        self.queue(change);
    }

    /// Recompute the watch set after the registered hierarchies changed.
    pub fn refresh_watches(&mut self, root: &SnapshotHierarchy) {
        let change = self.policy.hierarchies_changed(root, &self.hierarchies);
        self.queue(change);
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The queued watch set changes, in the order they were decided.
    pub fn take_pending_changes(&mut self) -> Vec<WatchSetChange> {
        std::mem::take(&mut self.pending)
    }

    /// See [`ProbeRegistry::trigger_watch_probe`].
    pub fn trigger_watch_probe(&self, path: &Path) -> bool {
        self.probes.trigger_watch_probe(path)
    }

    pub fn record_event(&mut self) {
        self.statistics.events_received += 1;
    }

    pub fn record_overflow(&mut self) {
        self.statistics.events_received += 1;
        self.statistics.unknown_event_encountered = true;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.statistics.error_while_receiving_file_changes = Some(message.into());
    }

    pub fn get_and_reset_statistics(&mut self) -> WatchingStatistics {
        std::mem::take(&mut self.statistics)
    }

    /// Returns the locations whose snapshots can no longer be trusted.
    ///
    /// Unsupported file systems only count in [`WatchMode::Default`]; with
    /// watching forced on, every hierarchy is watched.
    pub fn update_vfs_on_build_started(
        &mut self,
        root: &SnapshotHierarchy,
        watch_mode: WatchMode,
        unsupported_file_systems: Vec<PathBuf>,
    ) -> Vec<PathBuf> {
        let unsupported = if watch_mode == WatchMode::Default {
            unsupported_file_systems
        } else {
            Vec::new()
        };
        self.hierarchies.update_unsupported_file_systems(unsupported);

        let mut invalidate = self.hierarchies.remove_unproven_hierarchies();
        let unsupported_hierarchies: Vec<PathBuf> = self
            .hierarchies
            .hierarchies()
            .filter(|h| self.hierarchies.is_in_unsupported_file_system(h))
            .cloned()
            .collect();
        for hierarchy in &unsupported_hierarchies {
            self.probes.disarm(hierarchy);
        }
        invalidate.extend(self.hierarchies.unsupported_snapshot_roots(root));
        invalidate
    }

    /// Evict hierarchies beyond `max_hierarchies` and return the locations
    /// that are no longer watched.
    pub fn update_vfs_before_build_finished(&mut self, root: &SnapshotHierarchy, max_hierarchies: usize) -> Vec<PathBuf> {
        let evicted = self.hierarchies.prune(root, max_hierarchies);
        if !evicted.is_empty() {
            debug!(?evicted, "evicted watchable hierarchies");
        }
        self.hierarchies.unwatched_snapshot_roots(root)
    }

    /// Queue watches for the probe directories of every watched hierarchy and
    /// return the hosts whose probes should be armed.
    ///
    /// Arm them with [`ProbeRegistry::arm`] only after the queued changes
    /// reached the native watcher, so the probe write comes back as an event.
    pub fn update_vfs_after_build_finished(&mut self, root: &SnapshotHierarchy) -> Vec<PathBuf> {
        let watched = self.hierarchies.watched_hierarchies(root);
        let hosts: Vec<PathBuf> = self
            .probes
            .hosts_to_arm(&watched)
            .into_iter()
            .filter(|host| self.probes.prepare_probe_directory(host))
            .collect();

        let mut probe_directories = self.probes.armed_probe_directories();
        probe_directories.extend(hosts.iter().map(|host| self.probes.probe_directory(host)));
        let change = self.policy.probe_directories_changed(&probe_directories);
        self.queue(change);
        hosts
    }

    pub fn registered_hierarchies(&self) -> Vec<PathBuf> {
        self.hierarchies.hierarchies().cloned().collect()
    }

    pub fn watched_hierarchies(&self, root: &SnapshotHierarchy) -> Vec<PathBuf> {
        self.hierarchies.watched_hierarchies(root)
    }

    pub fn watched_directories(&self) -> Vec<PathBuf> {
        self.policy.watched_directories()
    }

    pub fn probes(&self) -> &Arc<ProbeRegistry> {
        &self.probes
    }

    /// Forget the queued changes; the native watcher is going away.
    pub fn close(&mut self) {
        debug!(
            watched = self.policy.watched_directories().len(),
            dropped = self.pending.len(),
            "closing file watcher registry"
        );
        self.pending.clear();
    }

    fn queue(&mut self, change: WatchSetChange) {
        if change.is_empty() {
            return;
        }
        let recursive = self.policy.is_recursive();
        for stopped in &change.stop {
            self.probes.disarm_covered_by(stopped, recursive);
        }
        self.pending.push(change);
    }
}
