// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};

pub mod mock;

/// Kind of a file system entry, as seen without following a final symlink
/// (`stat`) or after following it (`stat_following`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Missing,
    /// Sockets, devices, fifos.
    Other,
}

/// The metadata the snapshotter needs about a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub length: u64,
    /// Milliseconds since the unix epoch.
    pub last_modified: u64,
}

impl FileStat {
    pub fn missing() -> Self {
        Self {
            kind: EntryKind::Missing,
            length: 0,
            last_modified: 0,
        }
    }
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;
    /// Write `contents`, creating missing parent directories.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Metadata of `path` itself; a symlink is reported as `Symlink`.
    /// A non-existent path is `Missing`, not an error.
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Metadata of whatever `path` resolves to. A dangling link is `Missing`.
    fn stat_following(&self, path: &Path) -> Result<FileStat>;

    /// Return a list of entries in a directory.
    /// Returns full paths, in whatever order the platform lists them.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool {
        self.stat(path)
            .map(|s| s.kind != EntryKind::Missing)
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.stat_following(path), Ok(s) if s.kind == EntryKind::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.stat_following(path), Ok(s) if s.kind == EntryKind::Directory)
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

fn stat_from_metadata(meta: &fs::Metadata) -> FileStat {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    let last_modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    FileStat {
        kind,
        length: meta.len(),
        last_modified,
    }
}

fn stat_result(res: std::io::Result<fs::Metadata>, path: &Path) -> Result<FileStat> {
    match res {
        Ok(meta) => Ok(stat_from_metadata(&meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileStat::missing()),
        Err(e) => Err(e).with_context(|| format!("reading metadata of {:?}", path)),
    }
}

impl FileSystem for RealFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).with_context(|| format!("opening file {:?}", path))?;
        Ok(Box::new(file))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        stat_result(fs::symlink_metadata(path), path)
    }

    fn stat_following(&self, path: &Path) -> Result<FileStat> {
        stat_result(fs::metadata(path), path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry.with_context(|| format!("listing entry in {:?}", path))?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
