// src/vfs/mod.rs

//! The virtual file system facade.
//!
//! - [`watching`] holds the snapshot hierarchy and drives the watch registry
//!   across build boundaries.
//! - [`listener`] delivers handled changes to interested parties.
//! - [`coalesce`] turns a stream of changes into quiet-period batches.

pub mod coalesce;
pub mod listener;
pub mod watching;

pub use coalesce::{ChangeBatch, QuietPeriod, coalesce_changes};
pub use listener::{
    ChannelChangeListener, FileChange, FileChangeKind, FileChangeListener, LocationsWrittenByCurrentBuild,
};
pub use watching::{WatchingOptions, WatchingVirtualFileSystem};
