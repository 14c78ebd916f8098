// src/snapshot/filter.rs

//! Which entries a directory walk keeps.
//!
//! Two layers apply, in order:
//!
//! 1. [`DefaultExcludes`]: globs that are never part of a snapshot (VCS
//!    directories, editor backups). They do not mark a walk as filtered.
//! 2. [`SnapshottingFilter`]: the caller's include/exclude globs, matched on
//!    paths relative to the walk root. Anything they drop marks the walk as
//!    filtered, and a filtered result is never stored in the hierarchy.

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::snapshot::merkle::directory_hash;
use crate::snapshot::{FileSystemLocationSnapshot, FileType};

/// Globs that are never part of a snapshot, applied to every walk.
///
/// A pattern matches either the entry's name or its `/`-separated path
/// relative to the walk root, so `**/.git/**`, `*~` and `Thumbs.db` all mean
/// what they say. A pattern ending in `/**` also excludes the directory
/// itself, not only what is inside it.
#[derive(Clone, Default)]
pub struct DefaultExcludes {
    entries: Option<GlobSet>,
    directories: Option<GlobSet>,
    patterns: Vec<String>,
}

impl fmt::Debug for DefaultExcludes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultExcludes")
            .field("patterns", &self.patterns)
            .finish()
    }
}

impl DefaultExcludes {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
        let directory_patterns: Vec<String> = patterns
            .iter()
            .filter_map(|p| p.strip_suffix("/**"))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            entries: non_empty_globset(&patterns).context("building default exclude globset")?,
            directories: non_empty_globset(&directory_patterns).context("building default exclude globset")?,
            patterns,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the entry called `name`, at `relative_path` below the walk
    /// root, is left out of every snapshot.
    pub fn excludes(&self, name: &str, relative_path: &str, is_directory: bool) -> bool {
        let matches = |set: &Option<GlobSet>| {
            set.as_ref()
                .is_some_and(|set| set.is_match(name) || set.is_match(relative_path))
        };
        matches(&self.entries) || (is_directory && matches(&self.directories))
    }
}

fn non_empty_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    build_globset(patterns).map(Some)
}

/// Compiled include/exclude globs, evaluated on `/`-separated paths relative
/// to the root being snapshotted (e.g. `"src/main/App.java"`).
///
/// Include patterns only apply to files and missing entries; a directory is
/// dropped only if an exclude pattern matches it.
#[derive(Clone, Default)]
pub struct SnapshottingFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    patterns: (Vec<String>, Vec<String>),
}

impl fmt::Debug for SnapshottingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshottingFilter")
            .field("include", &self.patterns.0)
            .field("exclude", &self.patterns.1)
            .finish()
    }
}

impl SnapshottingFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: non_empty_globset(include).context("building include globset")?,
            exclude: non_empty_globset(exclude).context("building exclude globset")?,
            patterns: (include.to_vec(), exclude.to_vec()),
        })
    }

    /// True if this filter keeps everything.
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Whether the entry at `relative_path` (relative to the walk root) is kept.
    pub fn accepts(&self, relative_path: &str, is_directory: bool) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(relative_path) {
                return false;
            }
        }
        if is_directory {
            return true;
        }
        match &self.include {
            Some(include) => include.is_match(relative_path),
            None => true,
        }
    }

    /// Filter an already built snapshot in memory.
    ///
    /// Gives the same result as walking the same tree with this filter, and
    /// reports whether anything was removed. A root that is not a directory
    /// is kept as is, just like the walk keeps an explicitly requested file.
    pub fn apply(&self, snapshot: &FileSystemLocationSnapshot) -> (FileSystemLocationSnapshot, bool) {
        if self.is_empty() || snapshot.file_type() != FileType::Directory {
            return (snapshot.clone(), false);
        }
        let mut relative = Vec::new();
        self.filter_directory(snapshot, &mut relative)
    }

    fn filter_directory(
        &self,
        directory: &FileSystemLocationSnapshot,
        relative: &mut Vec<String>,
    ) -> (FileSystemLocationSnapshot, bool) {
        let mut filtered = false;
        let mut children = Vec::with_capacity(directory.children().len());

        for child in directory.children() {
            relative.push(child.name().to_string());
            let path = relative.join("/");
            let is_directory = child.file_type() == FileType::Directory;
            if !self.accepts(&path, is_directory) {
                filtered = true;
            } else if is_directory {
                let (child, child_filtered) = self.filter_directory(child, relative);
                filtered |= child_filtered;
                children.push(child);
            } else {
                children.push(child.clone());
            }
            relative.pop();
        }

        if !filtered {
            return (directory.clone(), false);
        }
        let hash = directory_hash(&children);
        let result = FileSystemLocationSnapshot::directory(
            directory.path().to_path_buf(),
            directory.access_type(),
            children,
            hash,
        );
        (result, true)
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
