// src/watch/probe.rs

//! Watch probes.
//!
//! A probe is a small file inside a watched hierarchy. When a build finishes
//! we write a timestamp into it (arming it) and expect the native watcher to
//! report that write back (triggering it). A probe that is still armed when
//! the next build starts means events for its file system are not arriving,
//! so everything we retained for the hierarchies sharing it is suspect.
//!
//! There is one probe per file system. When the file system of a hierarchy
//! cannot be determined, the hierarchy gets a probe of its own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use dashmap::DashMap;
use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::filesystem::FileSystemDetector;

pub const PROBE_FILE_NAME: &str = "file-system.probe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Unarmed,
    Armed,
    Triggered,
}

#[derive(Debug)]
struct WatchProbe {
    /// Registered hierarchies sharing this probe.
    hierarchies: Vec<PathBuf>,
    probe_file: PathBuf,
    state: ProbeState,
}

#[derive(Debug)]
pub struct ProbeRegistry {
    fs: Arc<dyn FileSystem>,
    detector: Arc<dyn FileSystemDetector>,
    probe_dir: String,
    /// Keyed by file system root, or by the hierarchy itself.
    probes: DashMap<PathBuf, WatchProbe>,
    keys_by_hierarchy: DashMap<PathBuf, PathBuf>,
}

impl ProbeRegistry {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        detector: Arc<dyn FileSystemDetector>,
        probe_dir: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            detector,
            probe_dir: probe_dir.into(),
            probes: DashMap::new(),
            keys_by_hierarchy: DashMap::new(),
        }
    }

    /// Directory that holds the probe file when `hierarchy` hosts it.
    pub fn probe_directory(&self, hierarchy: &Path) -> PathBuf {
        hierarchy.join(&self.probe_dir)
    }

    pub fn register_probe(&self, hierarchy: &Path) {
        if self.keys_by_hierarchy.contains_key(hierarchy) {
            return;
        }
        let key = match self.detector.file_system_root(hierarchy) {
            Some(root) => root,
            None => {
                debug!(hierarchy = %hierarchy.display(), "unknown file system, using a probe for the hierarchy alone");
                hierarchy.to_path_buf()
            }
        };
        let probe_file = self.probe_directory(hierarchy).join(PROBE_FILE_NAME);
        self.probes
            .entry(key.clone())
            .or_insert_with(|| WatchProbe {
                hierarchies: Vec::new(),
                probe_file,
                state: ProbeState::Unarmed,
            })
            .hierarchies
            .push(hierarchy.to_path_buf());
        self.keys_by_hierarchy.insert(hierarchy.to_path_buf(), key);
    }

    pub fn unregister_probe(&self, hierarchy: &Path) {
        let Some((_, key)) = self.keys_by_hierarchy.remove(hierarchy) else {
            return;
        };
        let unused = match self.probes.get_mut(&key) {
            Some(mut probe) => {
                probe.hierarchies.retain(|h| h != hierarchy);
                probe.hierarchies.is_empty()
            }
            None => false,
        };
        if unused {
            self.probes.remove(&key);
        }
    }

    pub fn state_of(&self, hierarchy: &Path) -> Option<ProbeState> {
        let key = self.key_of(hierarchy)?;
        self.probes.get(&key).map(|probe| probe.state)
    }

    /// Current location of the probe file for `hierarchy`.
    pub fn probe_file_of(&self, hierarchy: &Path) -> Option<PathBuf> {
        let key = self.key_of(hierarchy)?;
        self.probes.get(&key).map(|probe| probe.probe_file.clone())
    }

    /// For every unarmed probe, the first of `watched` that belongs to it.
    pub fn hosts_to_arm(&self, watched: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        for hierarchy in watched {
            let Some(key) = self.key_of(hierarchy) else {
                continue;
            };
            let unarmed = self
                .probes
                .get(&key)
                .is_some_and(|probe| probe.state == ProbeState::Unarmed);
            if unarmed && seen.insert(key) {
                hosts.push(hierarchy.clone());
            }
        }
        hosts
    }

    /// Create the probe directory below `host`. Returns `false` on failure.
    pub fn prepare_probe_directory(&self, host: &Path) -> bool {
        let directory = self.probe_directory(host);
        match self.fs.create_dir_all(&directory) {
            Ok(()) => true,
            Err(err) => {
                debug!(path = %directory.display(), "cannot create probe directory: {err:#}");
                false
            }
        }
    }

    /// Directories of probes that are armed and still waiting for their event.
    pub fn armed_probe_directories(&self) -> Vec<PathBuf> {
        self.probes
            .iter()
            .filter(|probe| probe.state == ProbeState::Armed)
            .filter_map(|probe| probe.probe_file.parent().map(Path::to_path_buf))
            .collect()
    }

    /// Write a fresh timestamp into the probe file, hosted by `host`.
    ///
    /// A no-op unless the probe is unarmed. A failed write leaves it unarmed.
    pub fn arm(&self, host: &Path) {
        let Some(key) = self.key_of(host) else {
            return;
        };
        let Some(mut probe) = self.probes.get_mut(&key) else {
            return;
        };
        if probe.state != ProbeState::Unarmed {
            return;
        }
        let probe_file = self.probe_directory(host).join(PROBE_FILE_NAME);
        match self.write_probe(&probe_file) {
            Ok(()) => {
                debug!(probe = %probe_file.display(), "armed watch probe");
                probe.probe_file = probe_file;
                probe.state = ProbeState::Armed;
            }
            Err(err) => debug!(probe = %probe_file.display(), "cannot arm watch probe: {err:#}"),
        }
    }

    /// Only an armed probe goes back to unarmed.
    pub fn disarm(&self, hierarchy: &Path) {
        let Some(key) = self.key_of(hierarchy) else {
            return;
        };
        if let Some(mut probe) = self.probes.get_mut(&key) {
            if probe.state == ProbeState::Armed {
                debug!(probe = %probe.probe_file.display(), "disarmed watch probe");
                probe.state = ProbeState::Unarmed;
            }
        }
    }

    /// Disarm probes whose file is no longer covered after the watch on
    /// `stopped` went away.
    pub fn disarm_covered_by(&self, stopped: &Path, recursive: bool) {
        for mut probe in self.probes.iter_mut() {
            let covered = if recursive {
                probe.probe_file.starts_with(stopped)
            } else {
                probe.probe_file.parent() == Some(stopped)
            };
            if covered && probe.state == ProbeState::Armed {
                debug!(probe = %probe.probe_file.display(), "watch on probe went away, disarming");
                probe.state = ProbeState::Unarmed;
            }
        }
    }

    /// Handle a native event on `path`.
    ///
    /// Returns `true` if `path` is a probe file or its directory, in which
    /// case the event tells nothing about the build's inputs and should not
    /// be handled further.
    pub fn trigger_watch_probe(&self, path: &Path) -> bool {
        for mut probe in self.probes.iter_mut() {
            if probe.probe_file == path {
                if probe.state == ProbeState::Armed {
                    debug!(probe = %path.display(), "watch probe triggered");
                    probe.state = ProbeState::Triggered;
                }
                return true;
            }
            if probe.probe_file.parent() == Some(path) {
                return true;
            }
        }
        false
    }

    /// Hierarchies whose probe was armed and never triggered.
    pub fn unproven_hierarchies(&self) -> Vec<PathBuf> {
        self.probes
            .iter()
            .filter(|probe| probe.state == ProbeState::Armed)
            .flat_map(|probe| probe.hierarchies.clone())
            .collect()
    }

    fn key_of(&self, hierarchy: &Path) -> Option<PathBuf> {
        self.keys_by_hierarchy.get(hierarchy).map(|key| key.value().clone())
    }

    fn write_probe(&self, probe_file: &Path) -> Result<()> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.fs
            .write(probe_file, millis.to_string().as_bytes())
            .with_context(|| format!("writing probe file {:?}", probe_file))
    }
}
