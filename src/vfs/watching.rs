// src/vfs/watching.rs

//! The watching virtual file system.
//!
//! Holds the current [`SnapshotHierarchy`] and keeps it honest between
//! builds: native events invalidate what they touch, probes catch file
//! systems that silently drop events, and at every build boundary anything
//! that is not watched any more is thrown away.
//!
//! All replacement of the hierarchy happens under one lock, so there is a
//! single writer at a time; readers get an immutable hierarchy value.
//!
//! Native watcher calls are never made under that lock. A native call can
//! wait for the event consumer to drain the bounded queue, and the consumer
//! needs the lock for every event. Updates queue [`NativeCommand`]s instead,
//! and they are applied in order under a separate lock once the state lock is
//! released.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::errors::{Result, VfsError};
use crate::fs::FileSystem;
use crate::hash::FileHasher;
use crate::snapshot::{
    DefaultExcludes, DirectorySnapshotter, FileSystemLocationSnapshot, NoopDiffListener,
    RetainedStatistics, SnapshotCollectingDiffListener, SnapshotDiffListener, SnapshotHierarchy,
    SnapshottingFilter, WalkStatistics,
};
use crate::types::{VfsLogging, WatchMode};
use crate::vfs::listener::{FileChange, FileChangeKind, FileChangeListener, LocationsWrittenByCurrentBuild};
use crate::watch::{
    FileSystemDetector, FileWatcherRegistry, NativeEvent, NativeEventReceiver, NativeWatcher,
    NativeWatcherFactory, ProbeRegistry, WatchSetChange, WatchStrategy, WatcherPlatform,
    WatchingStatistics,
};

/// Settings fixed for the lifetime of the file system.
#[derive(Debug, Clone)]
pub struct WatchingOptions {
    pub strategy: WatchStrategy,
    pub platform: WatcherPlatform,
    /// Name of the directory holding the probe file inside a hierarchy.
    pub probe_dir: String,
    /// Never watched; snapshots below them are kept regardless.
    pub immutable_locations: Vec<PathBuf>,
}

impl Default for WatchingOptions {
    fn default() -> Self {
        let platform = WatcherPlatform::current();
        Self {
            strategy: platform.default_strategy(),
            platform,
            probe_dir: ".vfswatch".to_string(),
            immutable_locations: Vec::new(),
        }
    }
}

/// A call on the native watcher, queued under the state lock.
#[derive(Debug)]
enum NativeCommand {
    Install(Box<dyn NativeWatcher>),
    Update(WatchSetChange),
    Shutdown,
}

/// The native watcher of the current generation.
#[derive(Debug, Default)]
struct NativeSlot {
    generation: u64,
    watcher: Option<Box<dyn NativeWatcher>>,
}

#[derive(Debug, Default)]
struct VfsState {
    root: SnapshotHierarchy,
    registry: Option<FileWatcherRegistry>,
    /// Bumped whenever a registry is created, so events of a closed watcher
    /// are recognised and dropped.
    generation: u64,
    /// Bumped on every invalidation; a walk that raced with one is not stored.
    invalidations: u64,
    /// Hierarchies registered before watching started.
    early_hierarchies: Vec<PathBuf>,
    unsupported_file_systems: Vec<PathBuf>,
    state_invalidated_at_start_of_build: bool,
    reason_for_not_watching: Option<String>,
    /// Tagged with the generation they were queued for.
    commands: Vec<(u64, NativeCommand)>,
}

#[derive(Debug)]
pub struct WatchingVirtualFileSystem {
    state: Mutex<VfsState>,
    /// Lock order: `native` before `state`, never the other way round.
    native: Mutex<NativeSlot>,
    /// A blocking task that applies native commands is queued.
    apply_scheduled: AtomicBool,
    snapshotter: DirectorySnapshotter,
    fs: Arc<dyn FileSystem>,
    detector: Arc<dyn FileSystemDetector>,
    watcher_factory: Arc<dyn NativeWatcherFactory>,
    options: WatchingOptions,
    listeners: Mutex<Vec<Arc<dyn FileChangeListener>>>,
    written_by_build: LocationsWrittenByCurrentBuild,
}

impl WatchingVirtualFileSystem {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        hasher: Arc<dyn FileHasher>,
        default_excludes: DefaultExcludes,
        detector: Arc<dyn FileSystemDetector>,
        watcher_factory: Arc<dyn NativeWatcherFactory>,
        options: WatchingOptions,
    ) -> Self {
        Self {
            state: Mutex::new(VfsState::default()),
            native: Mutex::new(NativeSlot::default()),
            apply_scheduled: AtomicBool::new(false),
            snapshotter: DirectorySnapshotter::new(Arc::clone(&fs), hasher, default_excludes),
            fs,
            detector,
            watcher_factory,
            options,
            listeners: Mutex::new(Vec::new()),
            written_by_build: LocationsWrittenByCurrentBuild::default(),
        }
    }

    pub fn add_change_listener(&self, listener: Arc<dyn FileChangeListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
    }

    // ---- reading and updating ----------------------------------------------

    /// The current hierarchy. Cheap; later updates do not affect it.
    pub fn root(&self) -> SnapshotHierarchy {
        self.lock_state().root.clone()
    }

    pub fn find(&self, path: &Path) -> Option<FileSystemLocationSnapshot> {
        self.lock_state().root.find_snapshot(path)
    }

    /// Snapshot `path`, reusing what the hierarchy already knows.
    ///
    /// A stored snapshot is filtered in memory. A fresh walk is stored only
    /// if the filter removed nothing and no invalidation raced with it.
    pub fn read(&self, path: &Path, filter: &SnapshottingFilter) -> Result<FileSystemLocationSnapshot> {
        let (stored, version) = {
            let state = self.lock_state();
            (state.root.find_snapshot(path), state.invalidations)
        };
        if let Some(stored) = stored {
            if filter.is_empty() {
                return Ok(stored);
            }
            return Ok(filter.apply(&stored).0);
        }

        let result = self.snapshotter.snapshot(path, filter)?;
        if !result.filtered {
            self.update(|state| {
                if state.invalidations == version {
                    let snapshot = result.snapshot.clone();
                    self.update_root(state, |root, listener| root.store(path, snapshot, listener));
                } else {
                    debug!(path = %path.display(), "location changed while snapshotting, not storing");
                }
            });
        }
        Ok(result.snapshot)
    }

    pub fn store(&self, path: &Path, snapshot: FileSystemLocationSnapshot) {
        self.update(|state| self.update_root(state, |root, listener| root.store(path, snapshot, listener)));
    }

    pub fn invalidate(&self, paths: &[PathBuf]) {
        self.update(|state| self.invalidate_locked(state, paths));
    }

    pub fn invalidate_all(&self) {
        self.update(|state| {
            self.snapshotter.hasher().invalidate_all();
            state.invalidations += 1;
            self.update_root(state, |root, listener| root.clear(listener));
        });
    }

    /// The running build wrote `paths`; forget them and ignore their events
    /// until the build finishes.
    pub fn record_locations_written(&self, paths: &[PathBuf]) {
        self.written_by_build.record_locations_written(paths);
        self.invalidate(paths);
    }

    pub fn take_walk_statistics(&self) -> WalkStatistics {
        self.snapshotter.take_statistics()
    }

    pub fn retained_statistics(&self) -> RetainedStatistics {
        self.lock_state().root.statistics()
    }

    pub fn is_watching(&self) -> bool {
        self.lock_state().registry.is_some()
    }

    pub fn watched_directories(&self) -> Vec<PathBuf> {
        self.lock_state()
            .registry
            .as_ref()
            .map(FileWatcherRegistry::watched_directories)
            .unwrap_or_default()
    }

    pub fn watched_hierarchies(&self) -> Vec<PathBuf> {
        let state = self.lock_state();
        state
            .registry
            .as_ref()
            .map(|registry| registry.watched_hierarchies(&state.root))
            .unwrap_or_default()
    }

    /// Whether the last build start had to throw away retained state.
    pub fn state_invalidated_at_start_of_build(&self) -> bool {
        self.lock_state().state_invalidated_at_start_of_build
    }

    // ---- build lifecycle ---------------------------------------------------

    /// Returns whether file system watching is active for this build.
    ///
    /// Watching needs a Tokio runtime to consume native events.
    pub fn after_build_started(self: &Arc<Self>, watch_mode: WatchMode, vfs_logging: VfsLogging) -> bool {
        self.written_by_build.build_started();
        self.update(|state| self.start_build(state, watch_mode, vfs_logging));
        self.is_watching()
    }

    fn start_build(self: &Arc<Self>, state: &mut VfsState, watch_mode: WatchMode, vfs_logging: VfsLogging) {
        state.reason_for_not_watching = None;
        state.state_invalidated_at_start_of_build = false;

        if !watch_mode.is_enabled() {
            if state.registry.is_some() {
                info!("Watching the file system is disabled");
            }
            self.close_locked(state);
            return;
        }

        state.unsupported_file_systems.clear();
        let could_detect = if watch_mode == WatchMode::Default {
            match self.detector.detect_unsupported_file_systems() {
                Ok(unsupported) => {
                    state.unsupported_file_systems = unsupported;
                    true
                }
                Err(err) => {
                    info!("Unable to detect unsupported file systems, not watching the file system: {err:#}");
                    state.reason_for_not_watching = Some("unable to detect unsupported file systems".to_string());
                    false
                }
            }
        } else {
            true
        };

        let statistics = state.registry.as_mut().map(FileWatcherRegistry::get_and_reset_statistics);
        match statistics {
            None => {
                state.root = SnapshotHierarchy::empty();
                if could_detect {
                    self.start_watching(state, watch_mode, Vec::new());
                }
            }
            Some(statistics) => {
                if has_dropped_state(&statistics) || !could_detect {
                    let previous = self.registered_hierarchies(state);
                    self.close_locked(state);
                    state.state_invalidated_at_start_of_build = true;
                    if could_detect {
                        self.start_watching(state, watch_mode, previous);
                    }
                } else {
                    let unsupported = state.unsupported_file_systems.clone();
                    let paths = match state.registry.as_mut() {
                        Some(registry) => registry.update_vfs_on_build_started(&state.root, watch_mode, unsupported),
                        None => Vec::new(),
                    };
                    state.state_invalidated_at_start_of_build = !paths.is_empty();
                    self.invalidate_locked(state, &paths);
                    self.refresh_watches(state);
                }
                self.log_statistics(state, &statistics, vfs_logging, "build started");
            }
        }
    }

    /// Register a hierarchy the build is going to read from.
    ///
    /// Before watching has started the hierarchy is remembered and registered
    /// once it does.
    pub fn register_watchable_hierarchy(&self, hierarchy: &Path) {
        self.update(|state| {
            if state.registry.is_none() {
                state.early_hierarchies.push(hierarchy.to_path_buf());
            } else {
                self.register_locked(state, hierarchy);
            }
        });
    }

    pub fn before_build_finished(self: &Arc<Self>, watch_mode: WatchMode, vfs_logging: VfsLogging, max_hierarchies: usize) {
        self.update(|state| self.finish_build(state, watch_mode, vfs_logging, max_hierarchies));
    }

    fn finish_build(
        self: &Arc<Self>,
        state: &mut VfsState,
        watch_mode: WatchMode,
        vfs_logging: VfsLogging,
        max_hierarchies: usize,
    ) {
        state.early_hierarchies.clear();

        if !watch_mode.is_enabled() {
            state.root = SnapshotHierarchy::empty();
            return;
        }
        if let Some(reason) = &state.reason_for_not_watching {
            info!("Not watching the file system: {reason}");
        }

        let statistics = state.registry.as_mut().map(FileWatcherRegistry::get_and_reset_statistics);
        let Some(statistics) = statistics else {
            state.root = SnapshotHierarchy::empty();
            return;
        };
        if has_dropped_state(&statistics) {
            let previous = self.registered_hierarchies(state);
            self.close_locked(state);
            self.start_watching(state, watch_mode, previous);
            return;
        }

        let paths = match state.registry.as_mut() {
            Some(registry) => registry.update_vfs_before_build_finished(&state.root, max_hierarchies),
            None => Vec::new(),
        };
        self.invalidate_locked(state, &paths);
        self.refresh_watches(state);
        self.log_statistics(state, &statistics, vfs_logging, "build finished");
    }

    /// Arm the probes of the watched hierarchies.
    ///
    /// Probe directories are watched natively before the probe is written,
    /// so the write itself comes back as an event.
    pub fn after_build_finished(&self) {
        self.written_by_build.build_finished();
        let to_arm = self.update(|state| {
            let VfsState {
                registry,
                root,
                generation,
                ..
            } = state;
            match registry.as_mut() {
                Some(registry) => {
                    let hosts = registry.update_vfs_after_build_finished(root);
                    Some((*generation, Arc::clone(registry.probes()), hosts))
                }
                None => {
                    *root = SnapshotHierarchy::empty();
                    None
                }
            }
        });
        let Some((generation, probes, hosts)) = to_arm else {
            return;
        };
        if !self.is_current(generation) {
            debug!(generation, "watching stopped before probes could be armed");
            return;
        }
        for host in &hosts {
            probes.arm(host);
        }
    }

    /// Stop watching and drop all retained state.
    pub fn close(&self) {
        debug!("Closing VFS, dropping state");
        self.update(|state| self.close_locked(state));
    }

    // ---- native events -----------------------------------------------------

    /// Handle one native event. Returns `false` once the event stream it
    /// came from is stale and should no longer be consumed.
    ///
    /// Watch changes caused by the event are only queued; see
    /// [`Self::has_native_commands`].
    pub fn handle_native_event(&self, generation: u64, event: NativeEvent) -> bool {
        let mut state = self.lock_state();
        if state.generation != generation {
            return false;
        }
        let Some(registry) = state.registry.as_mut() else {
            return false;
        };

        let (paths, change) = match event {
            NativeEvent::Change { change_type, path } => {
                registry.record_event();
                if registry.trigger_watch_probe(&path) {
                    return true;
                }
                if !self.written_by_build.should_watch(&path) {
                    debug!(path = %path.display(), "ignoring change to location written by the current build");
                    return true;
                }
                debug!("Handling VFS change {change_type} {}", path.display());
                let change = FileChange::new(change_type.into(), path.clone());
                (vec![path], change)
            }
            NativeEvent::Overflow { path } => {
                registry.record_overflow();
                warn!(path = ?path, "native watcher overflowed, invalidating everything watched");
                let mut paths = registry.registered_hierarchies();
                paths.extend(path.clone());
                (paths, FileChange::new(FileChangeKind::Overflow, path.unwrap_or_default()))
            }
            NativeEvent::Failure(message) => {
                warn!("Error while receiving file changes: {message}");
                registry.record_error(message);
                let paths = registry.registered_hierarchies();
                (paths, FileChange::new(FileChangeKind::Overflow, PathBuf::new()))
            }
        };

        let overflow = change.is_overflow();
        self.invalidate_locked(&mut state, &paths);
        if overflow {
            self.refresh_watches(&mut state);
        }
        self.broadcast(&change);
        true
    }

    /// Whether native watcher calls are queued and not yet made.
    pub fn has_native_commands(&self) -> bool {
        let state = self.lock_state();
        !state.commands.is_empty()
            || state
                .registry
                .as_ref()
                .is_some_and(FileWatcherRegistry::has_pending_changes)
    }

    /// Make the queued native watcher calls, in the order they were queued.
    ///
    /// Must not be called with the state lock held. May block until the
    /// native watcher answers, so the event consumer runs it on a blocking
    /// thread.
    pub fn apply_native_commands(&self) {
        let mut native = self.native.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            let commands = {
                let mut state = self.lock_state();
                collect_native_commands(&mut state);
                std::mem::take(&mut state.commands)
            };
            if commands.is_empty() {
                return;
            }

            let mut failed: Option<(u64, anyhow::Error)> = None;
            for (generation, command) in commands {
                match command {
                    NativeCommand::Install(watcher) => {
                        if let Some(mut previous) = native.watcher.replace(watcher) {
                            previous.shutdown();
                        }
                        native.generation = generation;
                    }
                    NativeCommand::Shutdown => {
                        if native.generation == generation {
                            if let Some(mut watcher) = native.watcher.take() {
                                watcher.shutdown();
                            }
                        }
                    }
                    NativeCommand::Update(change) => {
                        if native.generation != generation || failed.as_ref().is_some_and(|(g, _)| *g == generation) {
                            continue;
                        }
                        let Some(watcher) = native.watcher.as_mut() else {
                            continue;
                        };
                        if let Err(err) = apply_watch_set_change(watcher.as_mut(), &change) {
                            failed = Some((generation, err));
                        }
                    }
                }
            }

            if let Some((generation, err)) = failed {
                let mut state = self.lock_state();
                if state.generation == generation && state.registry.is_some() {
                    self.stop_watching_after_error(&mut state, &VfsError::Other(err));
                }
            }
        }
    }

    // ---- internals ---------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, VfsState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run `update` under the state lock, then make the native calls it
    /// queued.
    fn update<R>(&self, update: impl FnOnce(&mut VfsState) -> R) -> R {
        let result = {
            let mut state = self.lock_state();
            update(&mut state)
        };
        self.apply_native_commands();
        result
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock_state();
        state.generation == generation && state.registry.is_some()
    }

    fn start_watching(self: &Arc<Self>, state: &mut VfsState, watch_mode: WatchMode, hierarchies: Vec<PathBuf>) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("Couldn't start watching the file system: no async runtime to receive events on");
            state.reason_for_not_watching = Some("no async runtime".to_string());
            return;
        }
        let (watcher, events) = match self.watcher_factory.create(self.options.strategy) {
            Ok(created) => created,
            Err(err) => {
                warn!("Couldn't start watching the file system: {err:#}");
                state.reason_for_not_watching = Some(format!("{err:#}"));
                return;
            }
        };

        let probes = Arc::new(ProbeRegistry::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.detector),
            self.options.probe_dir.clone(),
        ));
        let mut registry = FileWatcherRegistry::new(
            self.options.strategy,
            self.options.platform,
            probes,
            Arc::clone(&self.fs),
            self.options.immutable_locations.clone(),
        );
        let unsupported = state.unsupported_file_systems.clone();
        let paths = registry.update_vfs_on_build_started(&state.root, watch_mode, unsupported);

        state.generation += 1;
        state.commands.push((state.generation, NativeCommand::Install(watcher)));
        state.registry = Some(registry);
        self.spawn_event_loop(state.generation, events);
        self.invalidate_locked(state, &paths);

        let mut pending = hierarchies;
        pending.append(&mut state.early_hierarchies);
        for hierarchy in pending {
            self.register_locked(state, &hierarchy);
        }
        info!(strategy = ?self.options.strategy, "Started watching the file system");
    }

    fn spawn_event_loop(self: &Arc<Self>, generation: u64, mut events: NativeEventReceiver) {
        let vfs = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(vfs) = vfs.upgrade() else {
                    break;
                };
                if !vfs.handle_native_event(generation, event) {
                    break;
                }
                vfs.schedule_native_commands();
            }
            debug!(generation, "native event stream closed");
        });
    }

    /// Apply queued native commands on a blocking thread; the native calls
    /// may wait for the event loop to drain the queue.
    fn schedule_native_commands(self: Arc<Self>) {
        if !self.has_native_commands() || self.apply_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::task::spawn_blocking(move || {
            self.apply_scheduled.store(false, Ordering::SeqCst);
            self.apply_native_commands();
        });
    }

    fn register_locked(&self, state: &mut VfsState, hierarchy: &Path) {
        let result = {
            let VfsState { registry, root, .. } = &mut *state;
            match registry.as_mut() {
                Some(registry) => registry.register_watchable_hierarchy(hierarchy, root),
                None => return,
            }
        };
        match result {
            Ok(()) => {}
            Err(err @ (VfsError::WatchingNotSupported { .. } | VfsError::UnwatchableHierarchy(_))) => {
                warn!("{err}; continuing without watching it");
            }
            Err(err) => self.stop_watching_after_error(state, &err),
        }
    }

    fn registered_hierarchies(&self, state: &VfsState) -> Vec<PathBuf> {
        state
            .registry
            .as_ref()
            .map(FileWatcherRegistry::registered_hierarchies)
            .unwrap_or_default()
    }

    fn refresh_watches(&self, state: &mut VfsState) {
        let VfsState { registry, root, .. } = state;
        if let Some(registry) = registry.as_mut() {
            registry.refresh_watches(root);
        }
    }

    fn invalidate_locked(&self, state: &mut VfsState, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        let hasher = self.snapshotter.hasher();
        for path in paths {
            hasher.invalidate(path);
        }
        state.invalidations += 1;
        self.update_root(state, |root, listener| {
            paths
                .iter()
                .fold(root.clone(), |current, path| current.invalidate(path, listener))
        });
    }

    /// Replace the hierarchy with `update(current)`, telling the registry
    /// what changed.
    fn update_root<F>(&self, state: &mut VfsState, update: F)
    where
        F: FnOnce(&SnapshotHierarchy, &mut dyn SnapshotDiffListener) -> SnapshotHierarchy,
    {
        let Some(registry) = state.registry.as_mut() else {
            state.root = update(&state.root, &mut NoopDiffListener);
            return;
        };
        let mut diff = SnapshotCollectingDiffListener::default();
        let new_root = update(&state.root, &mut diff);
        if !diff.is_empty() {
            registry.virtual_file_system_contents_changed(&diff.removed, &diff.added, &new_root);
        }
        state.root = new_root;
    }

    fn stop_watching_after_error(&self, state: &mut VfsState, err: &VfsError) {
        warn!("Stopping file watching and invalidating VFS after an error happened: {err}");
        self.close_locked(state);
        for listener in self.listeners.lock().unwrap_or_else(|p| p.into_inner()).iter() {
            listener.stop_watching_after_error();
        }
    }

    fn close_locked(&self, state: &mut VfsState) {
        if let Some(mut registry) = state.registry.take() {
            registry.close();
            state.commands.push((state.generation, NativeCommand::Shutdown));
        }
        state.root = SnapshotHierarchy::empty();
        state.invalidations += 1;
        self.snapshotter.hasher().invalidate_all();
    }

    fn broadcast(&self, change: &FileChange) {
        for listener in self.listeners.lock().unwrap_or_else(|p| p.into_inner()).iter() {
            listener.handle_change(change);
        }
    }

    fn log_statistics(&self, state: &VfsState, statistics: &WatchingStatistics, vfs_logging: VfsLogging, phase: &str) {
        let retained = state.root.statistics();
        let hierarchies = state
            .registry
            .as_ref()
            .map(|registry| registry.watched_hierarchies(&state.root).len())
            .unwrap_or(0);
        match vfs_logging {
            VfsLogging::Verbose => warn!(
                phase,
                events = statistics.events_received,
                hierarchies,
                files = retained.files,
                directories = retained.directories,
                missing = retained.missing,
                "Virtual file system retains information about the watched hierarchies"
            ),
            VfsLogging::Normal => info!(
                phase,
                events = statistics.events_received,
                hierarchies,
                files = retained.files,
                directories = retained.directories,
                missing = retained.missing,
                "Virtual file system retains information about the watched hierarchies"
            ),
        }
    }
}

fn collect_native_commands(state: &mut VfsState) {
    let generation = state.generation;
    if let Some(registry) = state.registry.as_mut() {
        state.commands.extend(
            registry
                .take_pending_changes()
                .into_iter()
                .map(|change| (generation, NativeCommand::Update(change))),
        );
    }
}

fn apply_watch_set_change(watcher: &mut dyn NativeWatcher, change: &WatchSetChange) -> anyhow::Result<()> {
    if !change.stop.is_empty() {
        match watcher.stop_watching(&change.stop) {
            Ok(true) => debug!(count = change.stop.len(), "stopped watching"),
            Ok(false) => warn!(paths = ?change.stop, "some directories could not be unwatched"),
            Err(err) => warn!(paths = ?change.stop, "stopping to watch failed: {err:#}"),
        }
    }
    if !change.start.is_empty() {
        watcher.start_watching(&change.start)?;
        debug!(count = change.start.len(), "started watching");
    }
    Ok(())
}

fn has_dropped_state(statistics: &WatchingStatistics) -> bool {
    if statistics.unknown_event_encountered {
        warn!("Dropped VFS state due to lost state");
    }
    if let Some(error) = &statistics.error_while_receiving_file_changes {
        warn!("Dropped VFS state due to error while receiving file changes: {error}");
    }
    statistics.has_dropped_state()
}
