// src/fs/mock.rs

use super::{EntryKind, FileStat, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: u64 },
    Dir(Vec<String>), // List of child names, in listing order
    Symlink(PathBuf),
    /// Listed by its parent, but every read fails.
    Unreadable,
}

/// In-memory file system for deterministic tests.
///
/// Directory listings come back in insertion order, so two mocks populated in
/// different orders model two platforms listing the same tree differently.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<AtomicU64>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure roots exist
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(AtomicU64::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        // A panicking test thread must not cascade into unrelated assertions.
        self.files.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let modified = self.clock.fetch_add(1, Ordering::SeqCst);
        self.insert(
            path.as_ref(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.lock();
        Self::ensure_dir_entry(&mut files, path);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert(path.as_ref(), MockEntry::Symlink(target.into()));
    }

    pub fn add_unreadable(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Unreadable);
    }

    /// Remove an entry and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.lock();
        files.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
                let name = name.to_string_lossy();
                children.retain(|c| *c != name);
            }
        }
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let path = path.to_path_buf();
        let mut files = self.lock();
        files.insert(path.clone(), entry);

        // Ensure parent directories exist implicitly for simplicity in this mock
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };

            Self::ensure_dir_entry(&mut files, parent);
            Self::link_child(&mut files, parent, &path);
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if !files.contains_key(path) {
            files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
            if let Some(parent) = path.parent() {
                let parent = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };

                if parent != path {
                    Self::ensure_dir_entry(files, parent);
                    Self::link_child(files, parent, path);
                }
            }
        }
    }

    /// Resolve every symlink along `path`. `None` for dangling or looping links.
    fn resolve(files: &HashMap<PathBuf, MockEntry>, path: &Path) -> Option<PathBuf> {
        let mut hops = 0;
        let mut pending: Vec<Component<'_>> = path.components().rev().collect();
        let mut owned_pending: Vec<PathBuf> = Vec::new();
        let mut resolved = PathBuf::new();

        loop {
            let next = if let Some(owned) = owned_pending.pop() {
                owned
            } else if let Some(component) = pending.pop() {
                PathBuf::from(component.as_os_str())
            } else {
                return Some(resolved);
            };

            if next.as_os_str() == ".." {
                resolved.pop();
                continue;
            }
            resolved.push(&next);

            if let Some(MockEntry::Symlink(target)) = files.get(&resolved) {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return None;
                }
                let base = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
                let target = if target.is_absolute() {
                    target.clone()
                } else {
                    base.join(target)
                };
                resolved = PathBuf::new();
                let mut target_components: Vec<PathBuf> = target
                    .components()
                    .map(|c| PathBuf::from(c.as_os_str()))
                    .collect();
                target_components.reverse();
                owned_pending.extend(target_components);
            }
        }
    }

    fn stat_entry(&self, entry: Option<&MockEntry>) -> FileStat {
        match entry {
            Some(MockEntry::File { content, modified }) => FileStat {
                kind: EntryKind::File,
                length: content.len() as u64,
                last_modified: *modified,
            },
            Some(MockEntry::Dir(_)) => FileStat {
                kind: EntryKind::Directory,
                length: 0,
                last_modified: 0,
            },
            Some(MockEntry::Symlink(_)) => FileStat {
                kind: EntryKind::Symlink,
                length: 0,
                last_modified: 0,
            },
            Some(MockEntry::Unreadable) => FileStat {
                kind: EntryKind::File,
                length: 0,
                last_modified: 0,
            },
            None => FileStat::missing(),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let files = self.lock();
        let resolved = Self::resolve(&files, path).ok_or_else(|| anyhow!("File not found: {:?}", path))?;
        match files.get(&resolved) {
            Some(MockEntry::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            Some(MockEntry::Unreadable) => Err(anyhow!("Permission denied: {:?}", path)),
            _ => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let files = self.lock();
        match Self::resolve(&files, path) {
            Some(resolved) if files.contains_key(&resolved) => Ok(resolved),
            _ => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        let files = self.lock();
        // Like lstat: links in the parent are followed, the last one is not.
        let entry = files.get(path).or_else(|| {
            let parent = Self::resolve(&files, path.parent()?)?;
            files.get(&parent.join(path.file_name()?))
        });
        Ok(self.stat_entry(entry))
    }

    fn stat_following(&self, path: &Path) -> Result<FileStat> {
        let files = self.lock();
        match Self::resolve(&files, path) {
            Some(resolved) => Ok(self.stat_entry(files.get(&resolved))),
            None => Ok(FileStat::missing()),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.lock();
        let resolved = Self::resolve(&files, path).unwrap_or_else(|| path.to_path_buf());
        match files.get(&resolved) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::Unreadable) => Err(anyhow!("Permission denied: {:?}", path)),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
