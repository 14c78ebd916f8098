// src/engine/mod.rs

//! Build coordination for the vfswatch CLI.
//!
//! A "build" here is one pass over the configured inputs: snapshot every
//! root through the virtual file system, fingerprint each input and report
//! what changed since the previous pass. Between builds the VFS keeps the
//! snapshots of watched hierarchies, so an unchanged tree is not walked again.
//!
//! The pure input tracking lives in [`core`]; the async/IO shell that drives
//! the VFS build lifecycle and reacts to coalesced changes is implemented in
//! [`runtime`].

use std::fmt;

use crate::fingerprint::Change;
use crate::hash::ContentHash;
use crate::vfs::ChangeBatch;

/// Canonical input name type used throughout the engine.
pub type InputName = String;

/// What a build found for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputStatus {
    /// Nothing to compare against yet.
    FirstBuild,
    UpToDate,
    Changed(Vec<Change>),
    /// The input could not be snapshotted.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    pub input: InputName,
    pub status: InputStatus,
    pub hash: Option<ContentHash>,
    pub entries: usize,
}

impl fmt::Display for InputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            InputStatus::FirstBuild => write!(f, "{}: {} entries (first build)", self.input, self.entries),
            InputStatus::UpToDate => write!(f, "{}: up to date", self.input),
            InputStatus::Changed(changes) => {
                write!(f, "{}: {} change(s)", self.input, changes.len())?;
                for change in changes {
                    write!(f, "\n  {} {}", change.kind, change.normalized_path)?;
                }
                Ok(())
            }
            InputStatus::Failed(reason) => write!(f, "{}: failed: {}", self.input, reason),
        }
    }
}

/// Why a build ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTrigger {
    Initial,
    /// A batch with this many changed paths.
    Changes(usize),
    /// Events were lost; everything was rechecked.
    Overflow,
}

impl From<&ChangeBatch> for BuildTrigger {
    fn from(batch: &ChangeBatch) -> Self {
        if batch.overflowed {
            BuildTrigger::Overflow
        } else {
            BuildTrigger::Changes(batch.changes.len())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub build: u64,
    pub trigger: BuildTrigger,
    pub watching: bool,
    pub inputs: Vec<InputReport>,
}

impl BuildReport {
    pub fn changed_inputs(&self) -> impl Iterator<Item = &InputReport> {
        self.inputs
            .iter()
            .filter(|r| matches!(r.status, InputStatus::Changed(_)))
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build #{} ({:?}, watching: {})", self.build, self.trigger, self.watching)?;
        for input in &self.inputs {
            write!(f, "\n{input}")?;
        }
        Ok(())
    }
}

/// Options used by the async shell.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Stop after the first build (used for `--once`).
    pub exit_after_first_build: bool,
}

/// Events flowing into the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The coalescer closed a window of changes.
    ChangesDetected(ChangeBatch),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod runtime;

pub use core::{InputTracker, TrackedInput};
pub use runtime::{ChannelReportSink, ReportSink, Session, StdoutReportSink};
