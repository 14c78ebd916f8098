// src/hash/mod.rs

//! Content hashing.
//!
//! Everything that ends up in a snapshot or fingerprint is identified by a
//! [`ContentHash`], a 32-byte blake3 digest. Regular files are hashed by a
//! [`FileHasher`] collaborator; directories fold their children's hashes
//! through [`Hasher`] (see `snapshot::merkle`).

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::debug;

use crate::fs::FileSystem;
use crate::snapshot::FileMetadata;

/// A 32-byte content digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash a single byte string.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex digits are plenty to tell hashes apart in logs.
        let full = self.to_string();
        write!(f, "ContentHash({})", &full[..8])
    }
}

/// Seed of every directory hash, and the fingerprint hash of a directory entry.
pub static DIR_SIGNATURE: LazyLock<ContentHash> =
    LazyLock::new(|| signature("DIR_SIGNATURE"));

/// Fingerprint hash of a missing entry.
pub static MISSING_FILE_SIGNATURE: LazyLock<ContentHash> =
    LazyLock::new(|| signature("MISSING_FILE_SIGNATURE"));

fn signature(name: &str) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.put_string(name);
    hasher.finish()
}

/// Incremental hasher with unambiguous framing.
///
/// Strings are length-prefixed, so `("ab", "c")` and `("a", "bc")` differ.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    inner: blake3::Hasher,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(&mut self, value: &str) {
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
    }

    pub fn put_hash(&mut self, hash: &ContentHash) {
        self.inner.update(hash.as_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.inner.finalize().as_bytes())
    }
}

/// Hashes regular files during a directory walk.
///
/// Contract: same bytes and same metadata produce the same hash.
pub trait FileHasher: Send + Sync + fmt::Debug {
    fn hash(&self, path: &Path, metadata: &FileMetadata) -> Result<ContentHash>;

    /// Forget anything cached for `path` and its descendants.
    fn invalidate(&self, _path: &Path) {}

    fn invalidate_all(&self) {}
}

/// Streams file contents through blake3.
#[derive(Debug, Clone)]
pub struct ContentFileHasher {
    fs: Arc<dyn FileSystem>,
}

impl ContentFileHasher {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl FileHasher for ContentFileHasher {
    fn hash(&self, path: &Path, _metadata: &FileMetadata) -> Result<ContentHash> {
        let mut hasher = blake3::Hasher::new();
        let mut file = self
            .fs
            .open_read(path)
            .with_context(|| format!("opening file for hashing: {:?}", path))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("reading file for hashing: {:?}", path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(ContentHash(*hasher.finalize().as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    length: u64,
    last_modified: u64,
}

/// In-memory cache of file hashes, keyed by path and validated by
/// length and modification time.
///
/// The map is shared between the walk and the event loop, which invalidates
/// entries as native events arrive. Paths order by component, so everything
/// below a path is one contiguous range starting at it, and invalidation only
/// touches that range.
#[derive(Debug)]
pub struct CachingFileHasher {
    delegate: Arc<dyn FileHasher>,
    hashes: Mutex<BTreeMap<PathBuf, (CacheKey, ContentHash)>>,
}

impl CachingFileHasher {
    pub fn new(delegate: Arc<dyn FileHasher>) -> Self {
        Self {
            delegate,
            hashes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, (CacheKey, ContentHash)>> {
        self.hashes.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl FileHasher for CachingFileHasher {
    fn hash(&self, path: &Path, metadata: &FileMetadata) -> Result<ContentHash> {
        let key = CacheKey {
            length: metadata.length,
            last_modified: metadata.last_modified,
        };
        if let Some((cached_key, hash)) = self.lock().get(path) {
            if *cached_key == key {
                return Ok(*hash);
            }
        }

        // Hash outside the lock; files can be large.
        debug!("cache miss: computing hash for {:?}", path);
        let hash = self.delegate.hash(path, metadata)?;
        self.lock().insert(path.to_path_buf(), (key, hash));
        Ok(hash)
    }

    fn invalidate(&self, path: &Path) {
        {
            let mut hashes = self.lock();
            let below: Vec<PathBuf> = hashes
                .range::<Path, _>((Bound::Included(path), Bound::Unbounded))
                .map(|(cached, _)| cached)
                .take_while(|cached| cached.starts_with(path))
                .cloned()
                .collect();
            for cached in &below {
                hashes.remove(cached);
            }
            if !below.is_empty() {
                debug!(removed = below.len(), "invalidated cached hashes under {:?}", path);
            }
        }
        self.delegate.invalidate(path);
    }

    fn invalidate_all(&self) {
        self.lock().clear();
        self.delegate.invalidate_all();
    }
}
