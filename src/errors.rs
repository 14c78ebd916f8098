// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A root cannot be watched safely; the build continues unwatched for it.
    #[error("Unable to watch '{}': {reason}", path.display())]
    WatchingNotSupported { path: PathBuf, reason: String },

    /// A directory walk hit an entry it could not read.
    #[error("Could not snapshot '{}': {source}", path.display())]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unable to watch directory '{0}' since it is an immutable location")]
    UnwatchableHierarchy(String),

    #[error("Found existing snapshot at '{}' for unwatched hierarchy '{}'", snapshot.display(), hierarchy.display())]
    StaleSnapshot { snapshot: PathBuf, hierarchy: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VfsError {
    pub fn walk_failed(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        VfsError::WalkFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn watching_not_supported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VfsError::WatchingNotSupported {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, VfsError>;
