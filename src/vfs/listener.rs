// src/vfs/listener.rs

//! Who hears about handled changes, and which changes are not worth hearing
//! about.

use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::watch::NativeChangeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Modified,
    Removed,
    /// Events were lost; anything below `path` (or anywhere, for an empty
    /// path) may have changed.
    Overflow,
    /// Watching stopped after an error and all retained state was dropped.
    WatchingStopped,
}

impl From<NativeChangeType> for FileChangeKind {
    fn from(change_type: NativeChangeType) -> Self {
        match change_type {
            NativeChangeType::Created => FileChangeKind::Created,
            NativeChangeType::Modified => FileChangeKind::Modified,
            NativeChangeType::Removed => FileChangeKind::Removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: FileChangeKind,
    pub path: PathBuf,
}

impl FileChange {
    pub fn new(kind: FileChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Whether this change stands for an unknown set of changes.
    pub fn is_overflow(&self) -> bool {
        matches!(self.kind, FileChangeKind::Overflow | FileChangeKind::WatchingStopped)
    }
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FileChangeKind::Created => write!(f, "created {}", self.path.display()),
            FileChangeKind::Modified => write!(f, "modified {}", self.path.display()),
            FileChangeKind::Removed => write!(f, "removed {}", self.path.display()),
            FileChangeKind::Overflow => write!(f, "lost events below {}", self.path.display()),
            FileChangeKind::WatchingStopped => f.write_str("watching stopped"),
        }
    }
}

/// Receives every change the virtual file system handled.
///
/// Called while the file system is locked; implementations must not call
/// back into it.
pub trait FileChangeListener: Send + Sync + Debug {
    fn handle_change(&self, change: &FileChange);

    fn stop_watching_after_error(&self) {}
}

/// Forwards changes into a channel, typically towards a [`QuietPeriod`]
/// coalescer.
///
/// [`QuietPeriod`]: crate::vfs::coalesce::QuietPeriod
#[derive(Debug, Clone)]
pub struct ChannelChangeListener {
    tx: mpsc::UnboundedSender<FileChange>,
}

impl ChannelChangeListener {
    pub fn new(tx: mpsc::UnboundedSender<FileChange>) -> Self {
        Self { tx }
    }
}

impl FileChangeListener for ChannelChangeListener {
    fn handle_change(&self, change: &FileChange) {
        if self.tx.send(change.clone()).is_err() {
            debug!("change receiver dropped, not forwarding {change}");
        }
    }

    fn stop_watching_after_error(&self) {
        let _ = self
            .tx
            .send(FileChange::new(FileChangeKind::WatchingStopped, PathBuf::new()));
    }
}

/// Locations the running build wrote itself.
///
/// The build already invalidated them when writing, so the events they
/// cause are ignored until the build finishes.
#[derive(Debug, Default)]
pub struct LocationsWrittenByCurrentBuild {
    locations: Mutex<Option<Vec<PathBuf>>>,
}

impl LocationsWrittenByCurrentBuild {
    pub fn build_started(&self) {
        *self.lock() = Some(Vec::new());
    }

    pub fn build_finished(&self) {
        *self.lock() = None;
    }

    pub fn record_locations_written(&self, paths: &[PathBuf]) {
        if let Some(locations) = self.lock().as_mut() {
            locations.extend(paths.iter().cloned());
        }
    }

    /// Whether a change of `path` needs handling.
    pub fn should_watch(&self, path: &Path) -> bool {
        match self.lock().as_ref() {
            Some(locations) => !locations.iter().any(|l| path.starts_with(l)),
            None => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<PathBuf>>> {
        self.locations.lock().unwrap_or_else(|p| p.into_inner())
    }
}
