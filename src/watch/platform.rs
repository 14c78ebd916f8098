// src/watch/platform.rs

//! Native watch capabilities of the platform, decided once at startup and
//! passed down.

use crate::types::WatchStrategySetting;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherPlatform {
    Darwin,
    Windows,
    Linux,
    Other,
}

/// How directories are handed to the native watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStrategy {
    /// One recursive watch per hierarchy root.
    Hierarchical,
    /// One watch per directory with live content.
    NonHierarchical,
}

impl WatcherPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            WatcherPlatform::Darwin
        } else if cfg!(windows) {
            WatcherPlatform::Windows
        } else if cfg!(target_os = "linux") {
            WatcherPlatform::Linux
        } else {
            WatcherPlatform::Other
        }
    }

    /// FSEvents and ReadDirectoryChangesW watch whole subtrees cheaply;
    /// inotify and the polling fallback do not.
    pub fn default_strategy(self) -> WatchStrategy {
        match self {
            WatcherPlatform::Darwin | WatcherPlatform::Windows => WatchStrategy::Hierarchical,
            WatcherPlatform::Linux | WatcherPlatform::Other => WatchStrategy::NonHierarchical,
        }
    }

    /// Events carry canonical paths, so a root reached through a symlink
    /// would never match the events reported for it.
    pub fn reports_canonical_paths(self) -> bool {
        self == WatcherPlatform::Darwin
    }

    pub fn resolve(self, setting: WatchStrategySetting) -> WatchStrategy {
        match setting {
            WatchStrategySetting::Auto => self.default_strategy(),
            WatchStrategySetting::Hierarchical => WatchStrategy::Hierarchical,
            WatchStrategySetting::NonHierarchical => WatchStrategy::NonHierarchical,
        }
    }
}
