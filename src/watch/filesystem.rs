// src/watch/filesystem.rs

//! What we can find out about the file systems hierarchies live on.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// File system types whose change notifications cannot be trusted.
const UNSUPPORTED_FILE_SYSTEM_TYPES: &[&str] = &[
    "nfs", "nfs4", "cifs", "smb", "smbfs", "smb2", "smb3", "ncpfs", "afs", "9p", "vboxsf",
    "prl_fs", "sshfs", "fuse.sshfs", "fuse.rclone", "davfs", "fuse.davfs2", "fuse.s3fs",
];

pub trait FileSystemDetector: Send + Sync + Debug {
    /// Mount points of file systems that must not be watched.
    fn detect_unsupported_file_systems(&self) -> Result<Vec<PathBuf>>;

    /// The topmost directory on the same file system as `path`, or `None`
    /// if that cannot be determined.
    fn file_system_root(&self, path: &Path) -> Option<PathBuf>;
}

/// Reads mount information from the OS.
#[derive(Debug, Clone)]
pub struct DefaultFileSystemDetector {
    mounts_file: PathBuf,
}

impl Default for DefaultFileSystemDetector {
    fn default() -> Self {
        Self {
            mounts_file: PathBuf::from("/proc/mounts"),
        }
    }
}

impl DefaultFileSystemDetector {
    pub fn with_mounts_file(mounts_file: impl Into<PathBuf>) -> Self {
        Self {
            mounts_file: mounts_file.into(),
        }
    }
}

impl FileSystemDetector for DefaultFileSystemDetector {
    fn detect_unsupported_file_systems(&self) -> Result<Vec<PathBuf>> {
        if !cfg!(target_os = "linux") {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.mounts_file)
            .with_context(|| format!("reading mounts from {:?}", self.mounts_file))?;
        Ok(parse_unsupported_mounts(&contents))
    }

    #[cfg(unix)]
    fn file_system_root(&self, path: &Path) -> Option<PathBuf> {
        use std::os::unix::fs::MetadataExt;

        let canonical = match std::fs::canonicalize(path) {
            Ok(canonical) => canonical,
            Err(err) => {
                debug!(path = %path.display(), "cannot determine file system: {err}");
                return None;
            }
        };
        let device = std::fs::metadata(&canonical).ok()?.dev();
        let mut root = canonical.clone();
        for ancestor in canonical.ancestors().skip(1) {
            match std::fs::metadata(ancestor) {
                Ok(meta) if meta.dev() == device => root = ancestor.to_path_buf(),
                _ => break,
            }
        }
        Some(root)
    }

    #[cfg(not(unix))]
    fn file_system_root(&self, _path: &Path) -> Option<PathBuf> {
        None
    }
}

/// Mount points of unsupported file systems in `/proc/mounts` format.
pub fn parse_unsupported_mounts(contents: &str) -> Vec<PathBuf> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            UNSUPPORTED_FILE_SYSTEM_TYPES
                .contains(&fs_type)
                .then(|| PathBuf::from(unescape_mount_point(mount_point)))
        })
        .collect()
}

/// Undo the octal escapes (`\040` for a space) used in mount tables.
fn unescape_mount_point(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(value) = bytes.get(i + 1..i + 4).and_then(octal_byte) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    let value = digits.iter().try_fold(0u16, |acc, &d| {
        (b'0'..=b'7').contains(&d).then(|| acc * 8 + u16::from(d - b'0'))
    })?;
    u8::try_from(value).ok()
}
