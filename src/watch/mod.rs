// src/watch/mod.rs

//! File system watching.
//!
//! This module is responsible for:
//! - Wrapping the native watch service (`notify`) behind [`NativeWatcher`].
//! - Tracking which hierarchies may be watched ([`WatchableHierarchies`]).
//! - Proving that events actually arrive ([`ProbeRegistry`]).
//! - Deciding which directories to watch ([`WatchUpdatePolicy`]), either a
//!   recursive watch per hierarchy or a refcounted watch per directory.
//!
//! It does not own the snapshot hierarchy; the virtual file system tells the
//! [`FileWatcherRegistry`] what changed and applies the invalidations it asks
//! for.

pub mod filesystem;
pub mod hierarchies;
pub mod platform;
pub mod policy;
pub mod probe;
pub mod registry;
pub mod watcher;

pub use filesystem::{DefaultFileSystemDetector, FileSystemDetector};
pub use hierarchies::WatchableHierarchies;
pub use platform::{WatchStrategy, WatcherPlatform};
pub use policy::{HierarchicalWatchPolicy, NonHierarchicalWatchPolicy, WatchSetChange, WatchUpdatePolicy};
pub use probe::{PROBE_FILE_NAME, ProbeRegistry, ProbeState};
pub use registry::{FileWatcherRegistry, WatchingStatistics};
pub use watcher::{
    NativeChangeType, NativeEvent, NativeEventReceiver, NativeWatcher, NativeWatcherFactory,
    NotifyNativeWatcher, NotifyWatcherFactory, translate_notify_event,
};
